//! Broker delivery.
//!
//! Chunks are wrapped in an [`Envelope`] and published one at a time, in sequence
//! order, over a single channel per run. The transport sits behind
//! [`BrokerConnector`] / [`BrokerChannel`]; [`amqp`] provides the RabbitMQ adapter.

pub mod amqp;
mod channel;
mod envelope;
mod publisher;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use channel::{BrokerChannel, BrokerConnector, PublishOutcome, PushDestination};
pub use envelope::Envelope;
pub use publisher::{BundlePublisher, PublishSession};
pub use retry::{RetryConfig, RetryPolicy};
