//! Connector configuration.
//!
//! Settings are read once at startup (after `.env` has been loaded by `dotenvy`)
//! into an immutable [`ConnectorSettings`] that is handed to every component.
//! Lookups go through [`EnvSource`] so tests can supply a plain map.

mod interval;

pub use interval::RunInterval;

use std::collections::HashMap;
use std::path::PathBuf;

use bundle_split::{DEFAULT_MAX_BYTES, DEFAULT_MAX_OBJECTS, SplitPolicy};
use tracing::info;

use crate::broker::{RetryConfig, RetryPolicy};
use crate::domain::{ConnectorIdentity, ConnectorType};
use crate::{Error, Result};

/// Source of configuration values keyed by environment variable name.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Interpret a configuration flag. Accepts yes/y/true/1 (case-insensitive).
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

/// Typed accessors over an [`EnvSource`]. Empty values count as missing.
struct Lookup<'a, E: EnvSource + ?Sized> {
    env: &'a E,
}

impl<'a, E: EnvSource + ?Sized> Lookup<'a, E> {
    fn new(env: &'a E) -> Self {
        Self { env }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.env
            .var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("Missing required environment variable: {key}")))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            info!("Missing optional environment variable: {key}, defaulting to '{default}'");
            default.to_string()
        })
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).map(|v| parse_bool(&v)).unwrap_or(default)
    }

    fn number(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::config(format!("{key} must be a positive integer, got '{raw}'"))),
            None => Ok(default),
        }
    }
}

/// Connection settings for the platform API.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    pub url: String,
    pub token: String,
    pub ssl_verify: bool,
}

impl std::fmt::Debug for PlatformSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformSettings")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("ssl_verify", &self.ssl_verify)
            .finish()
    }
}

/// Where checkpoints are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBackend {
    /// Stored on the platform through connector pings.
    Platform,
    /// Stored in a local SQLite database.
    Sqlite { url: String },
}

impl StateBackend {
    fn parse(raw: &str) -> Result<Self> {
        if raw.eq_ignore_ascii_case("platform") {
            return Ok(Self::Platform);
        }
        if raw.starts_with("sqlite:") {
            return Ok(Self::Sqlite {
                url: raw.to_string(),
            });
        }
        Err(Error::config(format!(
            "Invalid CONNECTOR_STATE_BACKEND '{raw}', expected 'platform' or a 'sqlite:' URL"
        )))
    }
}

/// Immutable connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub platform: PlatformSettings,
    pub identity: ConnectorIdentity,
    pub run_interval: RunInterval,
    pub update_existing_data: bool,
    pub split_policy: SplitPolicy,
    pub publish_retry: RetryPolicy,
    pub state_backend: StateBackend,
    pub feed_path: Option<PathBuf>,
}

impl ConnectorSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Load settings from an arbitrary source.
    pub fn from_source<E: EnvSource + ?Sized>(env: &E) -> Result<Self> {
        let env = Lookup::new(env);

        let platform = PlatformSettings {
            url: env.required("OPENCTI_URL")?,
            token: env.required("OPENCTI_TOKEN")?,
            ssl_verify: env.flag("OPENCTI_SSL_VERIFY", true),
        };

        let raw_type = env.optional("CONNECTOR_TYPE", ConnectorType::ExternalImport.as_str());
        let connector_type = ConnectorType::parse(&raw_type)
            .ok_or_else(|| Error::config(format!("Invalid CONNECTOR_TYPE '{raw_type}'")))?;
        let identity = ConnectorIdentity::new(
            env.required("CONNECTOR_ID")?,
            env.required("CONNECTOR_NAME")?,
            connector_type,
            ConnectorIdentity::parse_scope(&env.optional("CONNECTOR_SCOPE", "stix2")),
        )
        .map_err(|e| Error::config(e.to_string()))?;

        let run_interval: RunInterval = env.required("CONNECTOR_RUN_EVERY")?.parse()?;

        let split_policy = SplitPolicy::new(
            env.number("CONNECTOR_CHUNK_MAX_OBJECTS", DEFAULT_MAX_OBJECTS)?,
            env.number("CONNECTOR_CHUNK_MAX_BYTES", DEFAULT_MAX_BYTES)?,
        )
        .map_err(|e| Error::config(e.to_string()))?;

        let publish_retry = match env.get("CONNECTOR_PUBLISH_MAX_RETRIES") {
            None => RetryPolicy::Unbounded,
            Some(raw) => {
                let max_retries: u32 = raw.parse().map_err(|_| {
                    Error::config(format!(
                        "CONNECTOR_PUBLISH_MAX_RETRIES must be a non-negative integer, got '{raw}'"
                    ))
                })?;
                RetryPolicy::Backoff(RetryConfig {
                    max_retries,
                    ..RetryConfig::default()
                })
            }
        };

        let state_backend = StateBackend::parse(&env.optional("CONNECTOR_STATE_BACKEND", "platform"))?;

        Ok(Self {
            platform,
            identity,
            run_interval,
            update_existing_data: env.flag("CONNECTOR_UPDATE_EXISTING_DATA", true),
            split_policy,
            publish_retry,
            state_backend,
            feed_path: env.get("CONNECTOR_FEED_PATH").map(PathBuf::from),
        })
    }
}
