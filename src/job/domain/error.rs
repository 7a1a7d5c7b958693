//! Error types for job domain transitions and parsing.

use super::{JobId, JobStatus};
use thiserror::Error;

/// Errors returned while mutating job aggregates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobDomainError {
    /// Status transitions only move forward along the lifecycle.
    #[error("invalid job status transition: {from} -> {to}")]
    InvalidTransition {
        /// Status before the attempted transition.
        from: JobStatus,
        /// Rejected target status.
        to: JobStatus,
    },

    /// Terminal jobs are immutable.
    #[error("job {0} is already terminal")]
    AlreadyTerminal(JobId),

    /// Priority must fit the persisted small-integer range.
    #[error("job priority {0} out of range")]
    PriorityOutOfRange(i32),
}

/// Error returned while parsing job statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job status: {0}")]
pub struct ParseJobStatusError(pub String);
