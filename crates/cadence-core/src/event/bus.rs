//! Broadcast event bus for distributing `WorkflowEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`: every subscriber sees every event
//! published after it subscribed, and a slow subscriber only lags itself.
//! Publishing with no active subscribers is a no-op.

use cadence_types::event::WorkflowEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for workflow and execution lifecycle events.
///
/// Cloning the bus clones the sender, allowing multiple producers.
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: WorkflowEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn deleted() -> WorkflowEvent {
        WorkflowEvent::WorkflowDeleted {
            workflow_id: Uuid::now_v7(),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(deleted());

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, WorkflowEvent::WorkflowDeleted { .. }));
        assert!(matches!(e2, WorkflowEvent::WorkflowDeleted { .. }));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.publish(deleted());
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_does_not_affect_others() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        for _ in 0..5 {
            bus.publish(deleted());
            assert!(fast.recv().await.is_ok());
        }

        match slow.try_recv() {
            Err(broadcast::error::TryRecvError::Lagged(n)) => assert!(n >= 3),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(deleted());

        assert!(rx.try_recv().is_ok());
    }
}
