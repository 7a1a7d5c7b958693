//! Persistence adapters for the apps module.

pub mod memory;
pub mod postgres;
