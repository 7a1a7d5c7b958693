//! Domain types for the per-server port pool.

mod pool;

pub use pool::{DEFAULT_MAX_PORT, DEFAULT_MIN_PORT, PortAllocationError, PortPool};
