//! Error types for firewall domain transitions and parsing.

use super::RuleId;
use thiserror::Error;

/// Errors returned while mutating firewall rule aggregates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FirewallDomainError {
    /// The rule has no confirmation outstanding.
    #[error("rule {0} is not pending confirmation")]
    NotPendingConfirmation(RuleId),

    /// Rollback already happened; it must apply exactly once.
    #[error("rule {0} was already rolled back")]
    AlreadyRolledBack(RuleId),

    /// A port range must satisfy `start <= end` with non-zero bounds.
    #[error("invalid port range {start}:{end}")]
    InvalidPortRange {
        /// Range start.
        start: u16,
        /// Range end.
        end: u16,
    },
}

/// Error returned while parsing port specifications.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown port specification: {0}")]
pub struct ParsePortSpecError(pub String);

/// Error returned while parsing rule directions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown rule direction: {0}")]
pub struct ParseDirectionError(pub String);

/// Error returned while parsing rule actions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown rule action: {0}")]
pub struct ParseActionError(pub String);

/// Error returned while parsing rule protocols.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown rule protocol: {0}")]
pub struct ParseProtocolError(pub String);
