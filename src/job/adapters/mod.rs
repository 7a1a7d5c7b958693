//! Adapter implementations of job ports.

pub mod memory;
pub mod postgres;
