//! Ordered, acknowledged chunk publishing.

use std::sync::Arc;

use bundle_split::Chunk;
use tracing::{debug, error, warn};

use super::channel::{BrokerChannel, BrokerConnector, PublishOutcome, PushDestination};
use super::envelope::Envelope;
use super::retry::RetryPolicy;
use crate::{Error, Result};

/// Publishes bundle chunks for one connector.
pub struct BundlePublisher {
    connector: Arc<dyn BrokerConnector>,
    destination: PushDestination,
    applicant_id: String,
    retry: RetryPolicy,
}

impl BundlePublisher {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        destination: PushDestination,
        applicant_id: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            connector,
            destination,
            applicant_id: applicant_id.into(),
            retry,
        }
    }

    pub fn destination(&self) -> &PushDestination {
        &self.destination
    }

    /// Open the channel used for one run.
    pub async fn open_session(&self) -> Result<PublishSession<'_>> {
        let channel = self.connector.open().await?;
        debug!(
            exchange = %self.destination.exchange,
            routing_key = %self.destination.routing_key,
            "Broker channel opened"
        );
        Ok(PublishSession {
            publisher: self,
            channel: Some(channel),
            last_sequence: 0,
            delivered: 0,
        })
    }
}

/// A single run's channel.
///
/// Chunks must arrive as `1, 2, ..., N`. Call [`PublishSession::close`] when done;
/// a session dropped without closing closes its channel in a background task,
/// which the runtime may not finish before shutdown.
pub struct PublishSession<'a> {
    publisher: &'a BundlePublisher,
    channel: Option<Box<dyn BrokerChannel>>,
    last_sequence: usize,
    delivered: usize,
}

impl PublishSession<'_> {
    /// Number of chunks confirmed by the broker so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Publish one chunk and wait for the broker's confirmation.
    ///
    /// Rejections re-send the identical envelope according to the retry policy;
    /// the next chunk is never sent while this one is outstanding.
    pub async fn publish(&mut self, chunk: &Chunk, work_id: &str, update: bool) -> Result<()> {
        let sequence = chunk.sequence();
        let total = chunk.total();
        if sequence != self.last_sequence + 1 {
            return Err(Error::validation(format!(
                "chunk {sequence}/{total} published out of order (last sent: {})",
                self.last_sequence
            )));
        }

        let envelope = Envelope::for_chunk(chunk, &self.publisher.applicant_id, work_id, update)?;
        let body = envelope.to_bytes()?;

        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| Error::broker("publish session is closed"))?;

        debug!(sequence, total, "Sending bundle chunk");
        let mut rejections = 0u32;
        loop {
            match channel.publish(&self.publisher.destination, &body).await? {
                PublishOutcome::Acked => {
                    debug!(sequence, total, "Bundle chunk sent");
                    self.last_sequence = sequence;
                    self.delivered += 1;
                    return Ok(());
                }
                outcome => {
                    rejections += 1;
                    let Some(delay) = self.publisher.retry.next_delay(rejections) else {
                        error!(
                            sequence,
                            total,
                            ?outcome,
                            attempts = rejections,
                            "Unable to send bundle chunk, giving up"
                        );
                        return Err(Error::PublishRejected {
                            sequence,
                            total,
                            attempts: rejections,
                        });
                    };

                    error!(
                        sequence,
                        total,
                        ?outcome,
                        attempt = rejections,
                        "Unable to send bundle chunk, retry..."
                    );
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Close the channel and connection.
    pub async fn close(mut self) -> Result<()> {
        match self.channel.take() {
            Some(mut channel) => {
                let result = channel.close().await;
                debug!(delivered = self.delivered, "Broker channel closed");
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for PublishSession<'_> {
    fn drop(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = channel.close().await {
                        warn!(error = %e, "Failed to close abandoned broker channel");
                    }
                });
            }
            Err(_) => warn!("Broker channel dropped outside a runtime; not closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::{ScriptedConnector, destination, sequence_of};
    use bundle_split::{Bundle, SplitPolicy};
    use serde_json::json;

    fn chunks(count: usize) -> Vec<Chunk> {
        let objects = (0..count).map(|i| json!({ "id": i })).collect();
        SplitPolicy::new(1, 1024)
            .unwrap()
            .split(Bundle::with_id("bundle--t", objects))
    }

    #[tokio::test]
    async fn test_publishes_in_order_on_one_channel() {
        let (connector, wire) = ScriptedConnector::new(Vec::new());
        let publisher =
            BundlePublisher::new(connector, destination(), "user-1", RetryPolicy::Unbounded);

        let chunks = chunks(3);
        let mut session = publisher.open_session().await.unwrap();
        for chunk in &chunks {
            session.publish(chunk, "work-1", true).await.unwrap();
        }
        assert_eq!(session.delivered(), 3);
        session.close().await.unwrap();

        let wire = wire.lock();
        assert_eq!(wire.opened, 1);
        assert_eq!(wire.closed, 1);
        assert_eq!(wire.sequences(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unbounded_retry_resends_identical_envelope() {
        let mut script = vec![PublishOutcome::Acked];
        script.extend(std::iter::repeat_n(PublishOutcome::Nacked, 40));
        script.push(PublishOutcome::Unroutable);
        let (connector, wire) = ScriptedConnector::new(script);
        let publisher =
            BundlePublisher::new(connector, destination(), "user-1", RetryPolicy::Unbounded);

        let chunks = chunks(3);
        let mut session = publisher.open_session().await.unwrap();
        for chunk in &chunks {
            session.publish(chunk, "work-1", true).await.unwrap();
        }
        session.close().await.unwrap();

        let wire = wire.lock();
        // 1 for chunk 1, 42 attempts for chunk 2, 1 for chunk 3.
        assert_eq!(wire.bodies.len(), 44);
        let retried = &wire.bodies[1..43];
        assert!(retried.iter().all(|b| b == &retried[0]));
        assert!(retried.iter().all(|b| sequence_of(b) == 2));
        assert_eq!(sequence_of(&wire.bodies[43]), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retry_escalates() {
        let (connector, wire) =
            ScriptedConnector::new(std::iter::repeat_n(PublishOutcome::Nacked, 10).collect());
        let policy = RetryPolicy::Backoff(crate::broker::RetryConfig {
            max_retries: 2,
            ..Default::default()
        });
        let publisher = BundlePublisher::new(connector, destination(), "user-1", policy);

        let chunks = chunks(2);
        let mut session = publisher.open_session().await.unwrap();
        let err = session.publish(&chunks[0], "work-1", true).await.unwrap_err();
        assert!(matches!(
            err,
            Error::PublishRejected {
                sequence: 1,
                attempts: 3,
                ..
            }
        ));
        assert_eq!(session.delivered(), 0);
        session.close().await.unwrap();
        assert_eq!(wire.lock().bodies.len(), 3);
    }

    #[tokio::test]
    async fn test_out_of_order_rejected() {
        let (connector, wire) = ScriptedConnector::new(Vec::new());
        let publisher =
            BundlePublisher::new(connector, destination(), "user-1", RetryPolicy::Unbounded);

        let chunks = chunks(3);
        let mut session = publisher.open_session().await.unwrap();
        assert!(session.publish(&chunks[1], "work-1", true).await.is_err());
        session.publish(&chunks[0], "work-1", true).await.unwrap();
        assert!(session.publish(&chunks[0], "work-1", true).await.is_err());
        session.close().await.unwrap();
        assert_eq!(wire.lock().bodies.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_session_closes_channel() {
        let (connector, wire) = ScriptedConnector::new(Vec::new());
        let publisher =
            BundlePublisher::new(connector, destination(), "user-1", RetryPolicy::Unbounded);

        {
            let _session = publisher.open_session().await.unwrap();
        }
        // Let the spawned close task run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(wire.lock().closed, 1);
    }
}
