//! Broadcast event publisher.
//!
//! Fans engine events out to any number of in-process subscribers over a
//! tokio broadcast channel. Subscribers that fall behind lose the oldest
//! events; publishing never waits.

use council_application::ports::event_publisher::{CouncilEvent, EventPublisher};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<CouncilEvent>,
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CouncilEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: &str, payload: Value) {
        let event = CouncilEvent {
            name: event.to_string(),
            payload,
        };
        // No subscribers is fine
        if self.sender.send(event).is_err() {
            trace!("No subscribers for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::ports::event_publisher::events;
    use serde_json::json;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = BroadcastEventPublisher::default();
        let mut rx = publisher.subscribe();

        publisher.publish(events::PHASE_CHANGED, json!({"from": "idle", "to": "collecting"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, events::PHASE_CHANGED);
        assert_eq!(event.payload["to"], "collecting");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = BroadcastEventPublisher::default();
        publisher.publish(events::ISSUE_CONSENSUS, json!({}));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let publisher = BroadcastEventPublisher::new(2);
        let mut rx = publisher.subscribe();
        for i in 0..4 {
            publisher.publish("tick", json!({"i": i}));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(rx.recv().await.unwrap().payload["i"], 2);
    }
}
