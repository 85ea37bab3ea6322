//! Fan-out of simulation events to subscribers.

use std::sync::Arc;

use survey_core::SimEvent;
use tokio::sync::broadcast;

/// Sink for events emitted by running missions.
///
/// `publish` must not block: it is called from inside the tick.
pub trait TelemetryPublisher: Send + Sync {
    fn publish(&self, event: SimEvent);
}

/// Event plus its pre-serialized JSON, shared by every subscriber.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: Arc<SimEvent>,
    pub payload: Arc<str>,
}

impl EventEnvelope {
    pub fn mission_id(&self) -> &str {
        self.event.mission_id()
    }

    pub fn drone_id(&self) -> &str {
        self.event.drone_id()
    }
}

/// In-process publisher over a tokio broadcast channel.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl TelemetryPublisher for BroadcastPublisher {
    fn publish(&self, event: SimEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!("Failed to serialize event for {}: {}", event.mission_id(), err);
                return;
            }
        };
        // No subscribers is not an error
        let _ = self.tx.send(EventEnvelope {
            event: Arc::new(event),
            payload: Arc::from(payload),
        });
    }
}
