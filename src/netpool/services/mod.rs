//! Allocation services over the port pool.

mod allocator;

pub use allocator::{MAX_BATCH_PORTS, PortAllocator, PortUsageStats};
