use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cti_relay::broker::amqp::LapinConnector;
use cti_relay::broker::BundlePublisher;
use cti_relay::collector::FileFeedCollector;
use cti_relay::config::{ConnectorSettings, ProcessEnv, StateBackend};
use cti_relay::logging::{self, LoggingOptions};
use cti_relay::panic_hook;
use cti_relay::platform::PlatformClient;
use cti_relay::scheduler::{ConnectorRunner, RunnerConfig};
use cti_relay::state::{PlatformStateStore, SqliteStateStore, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_options = LoggingOptions::from_source(&ProcessEnv);
    let _log_guard = logging::init_logging(&log_options)?;
    panic_hook::install(log_options.log_dir.as_deref());

    let settings = match ConnectorSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };

    let feed_path = settings
        .feed_path
        .clone()
        .context("CONNECTOR_FEED_PATH must be set to run the file feed collector")?;
    let collector = Arc::new(FileFeedCollector::new(feed_path));

    if !settings.platform.ssl_verify {
        warn!("Certificate validation has been disabled, this is not secure.");
    }

    let platform = Arc::new(PlatformClient::new(&settings.platform)?);
    let registration = platform
        .register(&settings.identity)
        .await
        .context("connector registration failed")?;

    let state: Arc<dyn StateStore> = match &settings.state_backend {
        StateBackend::Platform => Arc::new(PlatformStateStore::new(
            platform.clone(),
            registration.state.clone(),
        )),
        StateBackend::Sqlite { url } => Arc::new(SqliteStateStore::connect(url).await?),
    };

    let publisher = BundlePublisher::new(
        Arc::new(LapinConnector::new(registration.broker.clone())),
        registration.push.clone(),
        registration.applicant_id.clone(),
        settings.publish_retry.clone(),
    );

    let runner = ConnectorRunner::new(
        settings.identity.clone(),
        RunnerConfig::from_settings(&settings),
        collector,
        state,
        platform,
        publisher,
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    runner.run(cancel).await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                    _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl-C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, shutting down");
    }

    cancel.cancel();
}
