//! Domain model for firewall rules and the confirm-or-rollback safety net.

mod error;
mod rule;

pub use error::{
    FirewallDomainError, ParseActionError, ParseDirectionError, ParsePortSpecError,
    ParseProtocolError,
};
pub use rule::{
    Direction, FirewallRule, MANAGEMENT_PORTS, PersistedRuleData, PortSpec, RuleAction, RuleId,
    RuleProtocol, RuleSource,
};
