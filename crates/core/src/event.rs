//! Agent event stream — decoupled progress fan-out.
//!
//! The step loop publishes an event for every step record and status change.
//! Observers (the gateway's SSE/WebSocket handlers, the CLI) subscribe and
//! filter for the task they care about. Publishing never blocks and never
//! fails the task — a bus with no subscribers is fine.

use crate::task::{StepRecord, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Progress events emitted while tasks run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A step record was produced (think/tool/act/log/complete/error).
    Step {
        task_id: String,
        record: StepRecord,
    },

    /// The task moved to a new lifecycle status.
    StatusChanged {
        task_id: String,
        status: TaskStatus,
    },
}

impl AgentEvent {
    /// The task this event belongs to.
    pub fn task_id(&self) -> &str {
        match self {
            Self::Step { task_id, .. } | Self::StatusChanged { task_id, .. } => task_id,
        }
    }
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow consumers
/// may observe `Lagged` errors and miss events; the authoritative history is
/// always the task record itself.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{StepKind, StepRecord};

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(AgentEvent::Step {
            task_id: "t1".into(),
            record: StepRecord::new(1, StepKind::Think, "pondering"),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            AgentEvent::Step { task_id, record } => {
                assert_eq!(task_id, "t1");
                assert_eq!(record.kind, StepKind::Think);
            }
            _ => panic!("Expected Step event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(AgentEvent::StatusChanged {
            task_id: "t1".into(),
            status: TaskStatus::Running,
        });
    }

    #[test]
    fn event_task_id_accessor() {
        let event = AgentEvent::StatusChanged {
            task_id: "abc".into(),
            status: TaskStatus::Completed,
        };
        assert_eq!(event.task_id(), "abc");
    }
}
