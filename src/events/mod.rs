//! Outbound domain events.
//!
//! State transitions publish events after they commit; consumers (operator
//! notifications, audit trails) run asynchronously and can never block or
//! roll back the control plane.

mod adapters;
mod event;
mod publisher;

pub use adapters::{ChannelEventPublisher, CollectingEventPublisher, TracingEventPublisher};
pub use event::DomainEvent;
pub use publisher::EventPublisher;
