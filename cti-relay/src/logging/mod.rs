//! Logging setup.
//!
//! Console output always; a daily-rolling file when `CONNECTOR_LOG_DIR` is set.

use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::EnvSource;
use crate::{Error, Result};

/// Log file prefix; the appender adds a `.YYYY-MM-DD` suffix.
pub const LOG_FILE_NAME: &str = "cti-relay.log";

const DEFAULT_LEVEL: &str = "warning";

/// Timestamps in the host's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Logging settings read before the rest of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// `tracing` level name.
    pub level: String,
    pub log_dir: Option<PathBuf>,
}

impl LoggingOptions {
    pub fn from_source<E: EnvSource + ?Sized>(env: &E) -> Self {
        let raw = env
            .var("CONNECTOR_LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        Self {
            level: normalize_level(&raw).to_string(),
            log_dir: env
                .var("CONNECTOR_LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Filter directive applied when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> String {
        let level = &self.level;
        format!("cti_relay={level},bundle_split={level},lapin=warn,sqlx=warn,reqwest=warn")
    }
}

/// Map the connector's level names onto `tracing` levels.
pub fn normalize_level(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "warn",
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the process lifetime; dropping it stops
/// the file writer.
/// `RUST_LOG` overrides the filter built from [`LoggingOptions`].
pub fn init_logging(options: &LoggingOptions) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_filter()));

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_to_warn_without_file() {
        let options = LoggingOptions::from_source(&env(&[]));
        assert_eq!(options.level, "warn");
        assert!(options.log_dir.is_none());
        assert!(options.default_filter().starts_with("cti_relay=warn,"));
    }

    #[test]
    fn test_level_names() {
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("critical"), "error");
        assert_eq!(normalize_level(" Debug "), "debug");
        assert_eq!(normalize_level("verbose"), "warn");
    }

    #[test]
    fn test_log_dir_from_env() {
        let options = LoggingOptions::from_source(&env(&[
            ("CONNECTOR_LOG_LEVEL", "info"),
            ("CONNECTOR_LOG_DIR", "/var/log/cti-relay"),
        ]));
        assert_eq!(options.level, "info");
        assert_eq!(options.log_dir, Some(PathBuf::from("/var/log/cti-relay")));
        assert!(options.default_filter().contains("bundle_split=info"));
    }
}
