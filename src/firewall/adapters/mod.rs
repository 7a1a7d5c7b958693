//! Adapter implementations of firewall ports.

pub mod memory;
pub mod postgres;
