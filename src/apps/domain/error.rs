//! Domain errors for app and process lifecycles.

use super::app::WebAppStatus;
use super::process::ProcessStatus;
use thiserror::Error;

/// Validation and transition errors for the app aggregates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppDomainError {
    /// The app already reached a terminal creation state.
    #[error("invalid app status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: WebAppStatus,
        /// Attempted next status.
        to: WebAppStatus,
    },

    /// The process already reached the attempted state.
    #[error("invalid process status transition from {from} to {to}")]
    InvalidProcessTransition {
        /// Current status.
        from: ProcessStatus,
        /// Attempted next status.
        to: ProcessStatus,
    },
}

/// Failure to parse a stored app runtime tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized app runtime: {0}")]
pub struct ParseAppRuntimeError(pub String);

/// Failure to parse a stored app status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized app status: {0}")]
pub struct ParseWebAppStatusError(pub String);

/// Failure to parse a stored process status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized process status: {0}")]
pub struct ParseProcessStatusError(pub String);
