//! Persistence and observability adapters for the server module.

pub mod memory;
pub mod postgres;
