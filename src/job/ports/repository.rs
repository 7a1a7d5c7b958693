//! Repository port for durable job storage with atomic claim semantics.

use crate::job::domain::{Job, JobId, JobOutcome};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for job repository operations.
pub type JobRepositoryResult<T> = Result<T, JobRepositoryError>;

/// Result of applying a completion report to a job.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionApply {
    /// The outcome was recorded; the returned job carries it.
    Applied(Job),
    /// The job was already terminal; the returned job carries the *first*
    /// recorded outcome, untouched.
    Conflict(Job),
}

impl CompletionApply {
    /// Returns the job in either branch.
    #[must_use]
    pub const fn job(&self) -> &Job {
        match self {
            Self::Applied(job) | Self::Conflict(job) => job,
        }
    }

    /// Returns `true` when the outcome was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Job persistence contract.
///
/// Implementations carry the load-bearing concurrency guarantees of the
/// queue: [`claim_pending`](JobRepository::claim_pending) must never hand the
/// same job to two callers, and
/// [`complete`](JobRepository::complete) must apply at most one outcome.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Stores a new pending job.
    ///
    /// # Errors
    ///
    /// Returns [`JobRepositoryError::DuplicateJob`] when the identifier
    /// already exists.
    async fn insert(&self, job: &Job) -> JobRepositoryResult<()>;

    /// Atomically claims up to `limit` claimable jobs for a server, ordered
    /// by (priority ascending, creation time ascending), transitioning each
    /// to running with `started_at = now` in the same atomic step.
    ///
    /// Two overlapping calls for the same server must never return
    /// overlapping jobs: an agent retrying a timed-out poll gets different
    /// work, not duplicates.
    async fn claim_pending(
        &self,
        server_id: ServerId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> JobRepositoryResult<Vec<Job>>;

    /// Applies a completion report from the owning server.
    ///
    /// Already-terminal jobs yield [`CompletionApply::Conflict`] with their
    /// first outcome intact.
    ///
    /// # Errors
    ///
    /// Returns [`JobRepositoryError::NotFound`] when no job with this
    /// identifier belongs to `server_id`; ownership failures are
    /// indistinguishable from absence by design.
    async fn complete(
        &self,
        job_id: JobId,
        server_id: ServerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> JobRepositoryResult<CompletionApply>;

    /// Finds a job by identifier.
    ///
    /// Returns `None` when the job does not exist.
    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>>;

    /// Returns all jobs targeting a server, newest first.
    async fn list_for_server(&self, server_id: ServerId) -> JobRepositoryResult<Vec<Job>>;

    /// Persists an operator cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`JobRepositoryError::NotFound`] when the job does not exist.
    async fn update(&self, job: &Job) -> JobRepositoryResult<()>;
}

/// Errors returned by job repository implementations.
#[derive(Debug, Clone, Error)]
pub enum JobRepositoryError {
    /// A job with the same identifier already exists.
    #[error("duplicate job identifier: {0}")]
    DuplicateJob(JobId),

    /// The job was not found for the requesting server.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl JobRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
