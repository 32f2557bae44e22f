use async_trait::async_trait;

use super::unit::WorkOutcome;
use crate::Result;

/// Remote work-tracking service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkTracker: Send + Sync {
    /// Create a work unit and return its id. No chunk may be sent without one.
    async fn initiate(&self, connector_id: &str, work_name: &str) -> Result<String>;

    /// Declare how many chunks the platform should expect for this work unit.
    async fn declare_expectations(&self, work_id: &str, count: usize) -> Result<()>;

    /// Close the work unit. Called exactly once per initiated unit.
    async fn finalize(&self, work_id: &str, outcome: WorkOutcome, message: &str) -> Result<()>;
}
