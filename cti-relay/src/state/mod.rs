//! Checkpoint persistence.
//!
//! The runtime reads the checkpoint at the start of a run and writes it back at
//! the end of every run, successful or not.

mod memory;
mod platform;
mod sqlite;

pub use memory::MemoryStateStore;
pub use platform::PlatformStateStore;
pub use sqlite::SqliteStateStore;

use async_trait::async_trait;

use crate::Result;
use crate::domain::{Checkpoint, ConnectorIdentity};

/// Storage for a connector's opaque checkpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, identity: &ConnectorIdentity) -> Result<Checkpoint>;

    async fn set(&self, identity: &ConnectorIdentity, checkpoint: &Checkpoint) -> Result<()>;
}
