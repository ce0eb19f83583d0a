//! Event bus for workflow events.
//!
//! Keeps an append-only log of everything published (with per-type counts
//! for observability) and fans events out on a broadcast channel for
//! external observers. Publishing never blocks and never fails: a slow or
//! absent subscriber cannot stall a state transition.

use stagegate_types::WorkflowEvent;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

/// In-process bus for publishing and subscribing to workflow events.
pub struct EventBus {
    log: RwLock<Vec<WorkflowEvent>>,
    counts: RwLock<HashMap<&'static str, u64>>,
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            log: RwLock::new(Vec::new()),
            counts: RwLock::new(HashMap::new()),
            sender,
        }
    }

    /// Publish an event: log it, count it, broadcast it.
    pub fn publish(&self, event: WorkflowEvent) {
        debug!(event = event.name(), project = %event.project(), "event published");

        if let Ok(mut counts) = self.counts.write() {
            *counts.entry(event.name()).or_insert(0) += 1;
        }
        if let Ok(mut log) = self.log.write() {
            log.push(event.clone());
        }
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to live events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    /// How many events of the named type have been published.
    pub fn count(&self, name: &str) -> u64 {
        self.counts
            .read()
            .ok()
            .and_then(|counts| counts.get(name).copied())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagegate_types::{GateKey, ProjectId};

    fn evaluated(passed: bool) -> WorkflowEvent {
        WorkflowEvent::GateEvaluated {
            project: ProjectId::new("p1"),
            gate: GateKey::new("design_signoff"),
            passed,
        }
    }

    #[test]
    fn publish_logs_and_counts() {
        let bus = EventBus::new();
        bus.publish(evaluated(true));
        bus.publish(evaluated(false));

        assert_eq!(bus.len(), 2);
        assert_eq!(bus.count("gate_evaluated"), 2);
        assert_eq!(bus.count("gate_passed"), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_live_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(evaluated(true));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "gate_evaluated");
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(evaluated(true));
        assert_eq!(bus.len(), 1);
    }
}
