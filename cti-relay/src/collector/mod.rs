//! Source-specific collection.
//!
//! A [`Collector`] turns one run's worth of upstream data into intelligence
//! objects. It owns the checkpoint contents; the runtime only loads and stores it.

mod file_feed;

pub use file_feed::FileFeedCollector;

use async_trait::async_trait;
use bundle_split::IntelObject;

use crate::Result;
use crate::domain::Checkpoint;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Gather the objects for this run. Mutations to `checkpoint` are persisted
    /// even when this returns an error.
    async fn collect(&self, checkpoint: &mut Checkpoint) -> Result<Vec<IntelObject>>;
}
