//! Firewall-change safety net.
//!
//! Potentially self-locking rules go live immediately but enter a
//! confirmation window; rules the operator does not confirm in time are
//! rolled back automatically by a periodic sweep. The module follows
//! hexagonal architecture:
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
