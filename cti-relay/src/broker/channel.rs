use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Exchange and routing key the platform consumes bundles from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushDestination {
    pub exchange: String,
    pub routing_key: String,
}

/// Broker verdict for a single confirmed publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Routed and confirmed by the broker.
    Acked,
    /// Negatively acknowledged by the broker.
    Nacked,
    /// Returned because no queue is bound to the routing key.
    Unroutable,
}

/// An open channel with publisher confirms enabled.
///
/// Transport failures are returned as `Err`; broker verdicts as [`PublishOutcome`].
#[async_trait]
pub trait BrokerChannel: Send {
    async fn publish(&mut self, destination: &PushDestination, body: &[u8])
    -> Result<PublishOutcome>;

    /// Close the channel and its connection.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for broker channels.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrokerChannel>>;
}
