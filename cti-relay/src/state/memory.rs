use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::StateStore;
use crate::Result;
use crate::domain::{Checkpoint, ConnectorIdentity};

/// Process-local store. Checkpoints do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, identity: &ConnectorIdentity) -> Result<Checkpoint> {
        Ok(self
            .states
            .read()
            .get(&identity.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set(&self, identity: &ConnectorIdentity, checkpoint: &Checkpoint) -> Result<()> {
        self.states
            .write()
            .insert(identity.id.clone(), checkpoint.clone());
        Ok(())
    }
}
