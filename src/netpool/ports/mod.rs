//! Ports consumed by the allocator service.

mod usage;

pub use usage::{PortUsageError, PortUsageSource};
