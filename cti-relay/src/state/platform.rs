use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::StateStore;
use crate::Result;
use crate::domain::{Checkpoint, ConnectorIdentity};
use crate::platform::PlatformClient;

/// Checkpoint kept on the platform.
///
/// The platform only returns the state at registration, so reads come from a
/// local copy seeded with that value. Writes update the copy before pinging, so
/// a failed ping does not roll the next run back to stale progress.
#[derive(Debug)]
pub struct PlatformStateStore {
    client: Arc<PlatformClient>,
    current: Mutex<Checkpoint>,
}

impl PlatformStateStore {
    pub fn new(client: Arc<PlatformClient>, registered: Checkpoint) -> Self {
        Self {
            client,
            current: Mutex::new(registered),
        }
    }
}

#[async_trait]
impl StateStore for PlatformStateStore {
    async fn get(&self, _identity: &ConnectorIdentity) -> Result<Checkpoint> {
        Ok(self.current.lock().clone())
    }

    async fn set(&self, identity: &ConnectorIdentity, checkpoint: &Checkpoint) -> Result<()> {
        *self.current.lock() = checkpoint.clone();
        self.client.ping(&identity.id, checkpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformSettings;
    use crate::domain::ConnectorType;

    fn unreachable_client() -> Arc<PlatformClient> {
        let client = PlatformClient::new(&PlatformSettings {
            url: "http://127.0.0.1:9".into(),
            token: "t".into(),
            ssl_verify: true,
        })
        .unwrap();
        Arc::new(client)
    }

    fn identity() -> ConnectorIdentity {
        ConnectorIdentity::new("c-1", "feed", ConnectorType::ExternalImport, vec![]).unwrap()
    }

    #[tokio::test]
    async fn test_reads_registered_state() {
        let mut registered = Checkpoint::new();
        registered.insert("last_run", 1714521600);

        let store = PlatformStateStore::new(unreachable_client(), registered.clone());
        assert_eq!(store.get(&identity()).await.unwrap(), registered);
    }

    #[tokio::test]
    async fn test_failed_ping_keeps_new_checkpoint() {
        let store = PlatformStateStore::new(unreachable_client(), Checkpoint::new());

        let mut advanced = Checkpoint::new();
        advanced.insert("cursor", 99);
        assert!(store.set(&identity(), &advanced).await.is_err());

        assert_eq!(store.get(&identity()).await.unwrap(), advanced);
    }
}
