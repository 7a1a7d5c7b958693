//! Fleetward: pull-based server-fleet control plane.
//!
//! This crate implements the agent orchestration core of a multi-tenant
//! server-fleet manager. Managed machines run a lightweight agent with no
//! inbound exposure; all coordination happens because the agent periodically
//! calls home to heartbeat, poll for jobs, and report job outcomes.
//!
//! # Architecture
//!
//! Fleetward follows hexagonal architecture principles:
//!
//! - **Domain**: Pure state machines and aggregates with no infrastructure
//!   dependencies
//! - **Ports**: Abstract trait interfaces for persistence and side effects
//! - **Adapters**: Concrete implementations of ports (in-memory, `PostgreSQL`)
//!
//! # Modules
//!
//! - [`job`]: Durable, priority-ordered remote-command queue with atomic
//!   claim semantics and type-keyed completion dispatch
//! - [`server`]: Server aggregate, provisioning state machine, and the
//!   heartbeat reconciler
//! - [`firewall`]: Confirm-or-rollback safety net for self-locking rules
//! - [`netpool`]: Per-server TCP port allocator over live ownership queries
//! - [`apps`]: Web apps and supervised processes (the owners of allocated
//!   ports)
//! - [`events`]: Outbound domain events published after state transitions
//! - [`protocol`]: Agent-facing gateway and its HTTP adapter
//! - [`config`]: Environment-derived runtime configuration

pub mod apps;
pub mod config;
pub mod events;
pub mod firewall;
pub mod job;
pub mod netpool;
pub mod protocol;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;
