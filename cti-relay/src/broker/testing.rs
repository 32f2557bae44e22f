//! In-memory broker that records every publish and replays scripted verdicts.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::channel::{BrokerChannel, BrokerConnector, PublishOutcome, PushDestination};
use super::envelope::Envelope;
use crate::Result;

#[derive(Debug, Default)]
pub(crate) struct Wire {
    pub bodies: Vec<Vec<u8>>,
    pub opened: usize,
    pub closed: usize,
}

impl Wire {
    pub fn sequences(&self) -> Vec<usize> {
        self.bodies.iter().map(|b| sequence_of(b)).collect()
    }
}

pub(crate) fn sequence_of(body: &[u8]) -> usize {
    let envelope: Envelope = serde_json::from_slice(body).unwrap();
    envelope.action_sequence
}

pub(crate) fn destination() -> PushDestination {
    PushDestination {
        exchange: "amqp.worker.exchange".into(),
        routing_key: "push_routing_connector".into(),
    }
}

struct ScriptedChannel {
    wire: Arc<Mutex<Wire>>,
    script: Arc<Mutex<VecDeque<PublishOutcome>>>,
    hang: bool,
}

#[async_trait]
impl BrokerChannel for ScriptedChannel {
    async fn publish(&mut self, _destination: &PushDestination, body: &[u8]) -> Result<PublishOutcome> {
        self.wire.lock().bodies.push(body.to_vec());
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self
            .script
            .lock()
            .pop_front()
            .unwrap_or(PublishOutcome::Acked))
    }

    async fn close(&mut self) -> Result<()> {
        tokio::task::yield_now().await;
        self.wire.lock().closed += 1;
        Ok(())
    }
}

/// Acks everything once `script` runs out.
pub(crate) struct ScriptedConnector {
    wire: Arc<Mutex<Wire>>,
    script: Arc<Mutex<VecDeque<PublishOutcome>>>,
    hang: bool,
}

impl ScriptedConnector {
    pub fn new(script: Vec<PublishOutcome>) -> (Arc<Self>, Arc<Mutex<Wire>>) {
        Self::build(script, false)
    }

    /// Records the first publish, then never confirms it.
    pub fn hanging() -> (Arc<Self>, Arc<Mutex<Wire>>) {
        Self::build(Vec::new(), true)
    }

    fn build(script: Vec<PublishOutcome>, hang: bool) -> (Arc<Self>, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let connector = Arc::new(Self {
            wire: wire.clone(),
            script: Arc::new(Mutex::new(script.into())),
            hang,
        });
        (connector, wire)
    }
}

#[async_trait]
impl BrokerConnector for ScriptedConnector {
    async fn open(&self) -> Result<Box<dyn BrokerChannel>> {
        self.wire.lock().opened += 1;
        Ok(Box::new(ScriptedChannel {
            wire: self.wire.clone(),
            script: self.script.clone(),
            hang: self.hang,
        }))
    }
}
