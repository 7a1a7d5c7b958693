//! Error types for server domain transitions and parsing.

use super::{ProvisioningPhase, ServerStatus, StepStatus};
use thiserror::Error;

/// Errors returned while mutating server or step aggregates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerDomainError {
    /// The requested server status transition is not allowed.
    #[error("invalid server status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Status before the attempted transition.
        from: ServerStatus,
        /// Rejected target status.
        to: ServerStatus,
    },

    /// The requested provisioning phase transition would regress.
    #[error("provisioning phase may not regress: {from} -> {to}")]
    PhaseRegression {
        /// Phase before the attempted transition.
        from: ProvisioningPhase,
        /// Rejected target phase.
        to: ProvisioningPhase,
    },

    /// The requested step status transition is not allowed.
    #[error("invalid provisioning step transition: {from} -> {to}")]
    InvalidStepTransition {
        /// Step status before the attempted transition.
        from: StepStatus,
        /// Rejected target status.
        to: StepStatus,
    },

    /// The presented provision token does not match or has expired.
    #[error("provision token rejected")]
    ProvisionTokenRejected,

    /// The server has no provision token outstanding.
    #[error("no provision token outstanding")]
    NoProvisionToken,
}

/// Error returned while parsing server statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown server status: {0}")]
pub struct ParseServerStatusError(pub String);

/// Error returned while parsing provisioning phases from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown provisioning phase: {0}")]
pub struct ParseProvisioningPhaseError(pub String);

/// Error returned while parsing step statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown step status: {0}")]
pub struct ParseStepStatusError(pub String);

/// Error returned while parsing step categories from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown step category: {0}")]
pub struct ParseStepCategoryError(pub String);

/// Error returned while parsing service statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown service status: {0}")]
pub struct ParseServiceStatusError(pub String);
