//! Domain events published by the ingestion pipeline, the agent loop and the
//! analysis service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A batch of chunks was embedded and upserted
    BatchIngested {
        workspace_id: String,
        chunks: usize,
        timestamp: DateTime<Utc>,
    },

    /// The agent loop dispatched a tool call
    ToolDispatched {
        tool_name: String,
        iteration: u32,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// An agent session reached a terminal state
    AgentTerminated {
        termination: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// An analysis request completed
    AnalysisCompleted {
        request_id: String,
        contexts: usize,
        actions: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Subscribers receive every event and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
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

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolDispatched {
            tool_name: "search_codebase".into(),
            iteration: 1,
            success: true,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolDispatched { tool_name, success, .. } => {
                assert_eq!(tool_name, "search_codebase");
                assert!(success);
            }
            _ => panic!("Expected ToolDispatched event"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::BatchIngested {
            workspace_id: "ws".into(),
            chunks: 3,
            timestamp: Utc::now(),
        });
    }
}
