//! `PostgreSQL` adapters for firewall persistence.

mod models;
mod repository;
mod schema;

pub use repository::PostgresFirewallRuleRepository;
