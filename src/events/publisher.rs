//! Publisher port for outbound domain events.

use super::DomainEvent;

/// Fire-and-forget event sink.
///
/// Publication happens after the owning state transition is durable and must
/// never fail the caller: implementations log and swallow delivery errors.
pub trait EventPublisher: Send + Sync {
    /// Publishes one event.
    fn publish(&self, event: DomainEvent);
}
