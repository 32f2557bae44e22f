//! Domain layer for cti-relay.
//!
//! Connector identity and the opaque checkpoint carried between runs.

pub mod checkpoint;
pub mod identity;

pub use checkpoint::Checkpoint;
pub use identity::{ConnectorIdentity, ConnectorType};
