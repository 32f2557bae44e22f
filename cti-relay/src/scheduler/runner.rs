use std::sync::Arc;
use std::time::Duration;

use bundle_split::{Bundle, SplitPolicy};
use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::cycle::{Pace, RunCycle};
use crate::{Error, Result};
use crate::broker::BundlePublisher;
use crate::collector::Collector;
use crate::config::ConnectorSettings;
use crate::domain::{Checkpoint, ConnectorIdentity};
use crate::state::StateStore;
use crate::work::{WorkOutcome, WorkTracker, WorkUnit};

/// Scheduling and delivery knobs for the runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub interval: Duration,
    pub update_existing_data: bool,
    pub split_policy: SplitPolicy,
}

impl RunnerConfig {
    pub fn from_settings(settings: &ConnectorSettings) -> Self {
        Self {
            interval: settings.run_interval.as_duration(),
            update_existing_data: settings.update_existing_data,
            split_policy: settings.split_policy,
        }
    }
}

/// Summary of one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub work_id: String,
    pub outcome: WorkOutcome,
    pub message: String,
    pub objects: usize,
    pub chunks: usize,
    pub delivered: usize,
}

#[derive(Debug, Default)]
struct Progress {
    objects: usize,
    chunks: usize,
    delivered: usize,
}

/// Drives collection and delivery on a fixed interval.
pub struct ConnectorRunner {
    identity: ConnectorIdentity,
    config: RunnerConfig,
    collector: Arc<dyn Collector>,
    state: Arc<dyn StateStore>,
    tracker: Arc<dyn WorkTracker>,
    publisher: BundlePublisher,
}

impl ConnectorRunner {
    pub fn new(
        identity: ConnectorIdentity,
        config: RunnerConfig,
        collector: Arc<dyn Collector>,
        state: Arc<dyn StateStore>,
        tracker: Arc<dyn WorkTracker>,
        publisher: BundlePublisher,
    ) -> Self {
        Self {
            identity,
            config,
            collector,
            state,
            tracker,
            publisher,
        }
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Cancellation stops an in-flight run at its next await point or ends the
    /// sleep between runs. An interrupted run still closes its broker channel
    /// but leaves its work unit open and does not store the checkpoint.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            collector = self.collector.name(),
            interval = ?self.config.interval,
            "Starting {} connector...",
            self.identity.name
        );

        while !cancel.is_cancelled() {
            let cycle = RunCycle::start(self.config.interval);

            match self.run_until_cancelled(&cancel).await {
                Ok(report) if report.outcome.is_error() => {
                    warn!(work_id = %report.work_id, "{}", report.message);
                }
                Ok(report) => {
                    info!(work_id = %report.work_id, "{}", report.message);
                }
                Err(Error::Cancelled) => break,
                Err(e) => {
                    error!(error = %e, "Connector run failed");
                }
            }

            if let Some(remaining) = report_pace(cycle.pace(Instant::now())) {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }

        info!("Connector received cancellation signal");
        info!("{} connector stopped", self.identity.name);
    }

    /// Execute a single run: collect, split, deliver, report and persist.
    ///
    /// Failures after the work unit exists are reported through it and the
    /// checkpoint is stored regardless; only failures to load state, obtain a
    /// work id, or talk to the tracker/store at the end are returned as errors.
    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_until_cancelled(&CancellationToken::new()).await
    }

    #[instrument(skip(self, cancel), fields(connector_id = %self.identity.id))]
    async fn run_until_cancelled(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let mut checkpoint = interruptible(cancel, self.state.get(&self.identity)).await?;

        let work_name = format!(
            "{} work at {}",
            self.identity.id,
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f")
        );
        let work_id = interruptible(
            cancel,
            self.tracker.initiate(&self.identity.id, &work_name),
        )
        .await?;
        let mut unit = WorkUnit::initiated(work_id, work_name);
        debug!(work_id = %unit.id(), "Work initiated");

        let mut progress = Progress::default();
        let delivery = self
            .deliver(&mut checkpoint, &mut unit, &mut progress, cancel)
            .await;

        let (outcome, message) = match &delivery {
            Ok(()) => (
                WorkOutcome::Ok,
                format!("Successfully imported {} objects.", progress.objects),
            ),
            Err(Error::Cancelled) => {
                warn!(
                    work_id = %unit.id(),
                    delivered = progress.delivered,
                    chunks = progress.chunks,
                    "Run interrupted, work left open"
                );
                return Err(Error::Cancelled);
            }
            Err(e) => {
                error!(error = %e, work_id = %unit.id(), "Run failed");
                (
                    WorkOutcome::Error,
                    format!(
                        "Error importing {} objects ({}/{} chunks delivered): {e}",
                        progress.objects, progress.delivered, progress.chunks
                    ),
                )
            }
        };

        unit.finalize(outcome)?;
        let finalized = self.tracker.finalize(unit.id(), outcome, &message).await;
        let persisted = self.state.set(&self.identity, &checkpoint).await;
        finalized?;
        persisted?;

        Ok(RunReport {
            work_id: unit.id().to_string(),
            outcome,
            message,
            objects: progress.objects,
            chunks: progress.chunks,
            delivered: progress.delivered,
        })
    }

    async fn deliver(
        &self,
        checkpoint: &mut Checkpoint,
        unit: &mut WorkUnit,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let objects = interruptible(cancel, self.collector.collect(checkpoint)).await?;
        progress.objects = objects.len();
        if objects.is_empty() {
            info!("No new objects collected");
            return Ok(());
        }

        let chunks = self.config.split_policy.split(Bundle::new(objects));
        progress.chunks = chunks.len();

        interruptible(
            cancel,
            self.tracker.declare_expectations(unit.id(), chunks.len()),
        )
        .await?;
        unit.declare_expectations(chunks.len())?;

        let mut session = interruptible(cancel, self.publisher.open_session()).await?;
        let mut sent = Ok(());
        for chunk in &chunks {
            sent = interruptible(
                cancel,
                session.publish(chunk, unit.id(), self.config.update_existing_data),
            )
            .await;
            progress.delivered = session.delivered();
            if sent.is_err() {
                break;
            }
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close broker channel after delivery");
        }
        sent
    }
}

/// Await `operation` unless `cancel` fires first.
async fn interruptible<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = operation => result,
    }
}

/// Time to sleep before the next run, warning when the schedule has slipped.
fn report_pace(pace: Pace) -> Option<Duration> {
    match pace {
        Pace::Sleep(remaining) => {
            debug!(?remaining, "Sleeping until next run");
            Some(remaining)
        }
        Pace::Overdue(late) => {
            warn!(
                "Overdue at the end of the run, the next run was due {}s ago. \
                 Skipping sleep. Check the workload or interval to prevent these warnings.",
                late.as_secs()
            );
            None
        }
    }
}
