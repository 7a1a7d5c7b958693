//! Publisher adapters: structured-log sink, async channel, and a collecting
//! sink for tests.

use super::{DomainEvent, EventPublisher};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Publisher that emits each event as a structured log line.
///
/// The default sink for deployments without an external notification
/// consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: DomainEvent) {
        info!(event = ?event, "domain event");
    }
}

/// Publisher that forwards events onto an unbounded channel for an
/// asynchronous consumer (notification fan-out, webhooks, …).
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelEventPublisher {
    /// Creates a publisher and the receiving half for the consumer task.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventPublisher for ChannelEventPublisher {
    fn publish(&self, event: DomainEvent) {
        // A dropped consumer must not fail the state transition that
        // produced the event.
        if let Err(err) = self.sender.send(event) {
            warn!(error = %err, "event consumer gone; dropping event");
        }
    }
}

/// Publisher that records events in memory for assertions.
#[derive(Debug, Clone, Default)]
pub struct CollectingEventPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl CollectingEventPublisher {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything published so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventPublisher for CollectingEventPublisher {
    fn publish(&self, event: DomainEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
