//! Managed servers: registration, provisioning, and heartbeat reconciliation.
//!
//! A server starts as a pending record with a one-time provision token. The
//! agent installer consumes the token to register, the first heartbeat fans
//! the catalog out into provisioning steps and jobs, and every subsequent
//! heartbeat flows through the reconciler to refresh liveness, observed
//! state, and metrics.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
