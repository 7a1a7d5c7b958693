//! Remote-command job queue.
//!
//! The queue is the durable, priority-ordered record of every remote command
//! the control plane wants executed. Agents poll it, claim work atomically,
//! and report outcomes; a type-keyed handler map reacts to completions. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
