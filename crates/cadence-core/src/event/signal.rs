//! Named-event signal channel for event waits.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;

/// A named event fired through `WorkflowManager::trigger_event`.
#[derive(Debug, Clone)]
pub struct NamedEvent {
    pub name: String,
    pub data: Value,
}

/// Broadcast of named events to every waiter.
#[derive(Clone)]
pub struct EventSignals {
    sender: broadcast::Sender<NamedEvent>,
}

impl EventSignals {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NamedEvent> {
        self.sender.subscribe()
    }

    /// Wake every waiter; returns how many were listening.
    pub fn fire(&self, name: &str, data: Value) -> usize {
        self.sender
            .send(NamedEvent {
                name: name.to_string(),
                data,
            })
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSignals")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Wait on `rx` for an event called `name`, up to `limit`.
///
/// Lagging just skips ahead; a closed channel or the limit yields `None`.
pub async fn wait_for_named(
    rx: &mut broadcast::Receiver<NamedEvent>,
    name: &str,
    limit: Duration,
) -> Option<Value> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if event.name == name => return Some(event.data),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event waiter lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(limit, wait).await.ok().flatten()
}
