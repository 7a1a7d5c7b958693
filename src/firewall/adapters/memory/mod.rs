//! In-memory adapters for firewall persistence.

mod rule;

pub use rule::InMemoryFirewallRuleRepository;
