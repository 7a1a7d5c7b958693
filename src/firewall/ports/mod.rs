//! Port contracts for the firewall safety net.

pub mod repository;

pub use repository::{FirewallRepositoryError, FirewallRepositoryResult, FirewallRuleRepository};
