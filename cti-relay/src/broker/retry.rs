//! Retry policy for rejected publishes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay_ms as f64
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);

        let delay_ms = base_delay.min(self.max_delay_ms as f64) as u64;

        let final_delay = if self.use_jitter {
            // Add up to 25% jitter
            let jitter = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay_ms + jitter
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Check if another retry should be attempted.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// How a rejected (nacked or unroutable) envelope is re-sent.
///
/// The envelope itself never changes between attempts.
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// Re-send immediately, forever. A persistently misrouted message blocks the run.
    #[default]
    Unbounded,
    /// Exponential backoff; the run fails once the attempts are exhausted.
    Backoff(RetryConfig),
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` when retries are exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Unbounded => Some(Duration::ZERO),
            Self::Backoff(config) => {
                // `attempt` counts rejections so far; retry number `attempt` is allowed
                // while fewer than `max_retries` retries have been made.
                if config.should_retry(attempt.saturating_sub(1)) {
                    Some(config.delay_for_attempt(attempt))
                } else {
                    None
                }
            }
        }
    }
}
