//! Queue orchestration: enqueue, atomic fetch, and completion with
//! type-keyed dispatch.

use super::dispatch::HandlerRegistry;
use crate::job::domain::{
    DEFAULT_MAX_RETRIES, DEFAULT_PRIORITY, Job, JobDomainError, JobId, JobOutcome,
};
use crate::job::ports::{CompletionApply, JobRepository, JobRepositoryError};
use crate::server::domain::{ServerId, TenantId};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Request payload for enqueueing a remote command.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueJobRequest {
    server_id: ServerId,
    tenant_id: TenantId,
    job_type: String,
    payload: Value,
    priority: i16,
    max_retries: i32,
}

impl EnqueueJobRequest {
    /// Creates a request with required fields and default priority/retries.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        tenant_id: TenantId,
        job_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            server_id,
            tenant_id,
            job_type: job_type.into(),
            payload,
            priority: DEFAULT_PRIORITY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the priority (lower is more urgent).
    #[must_use]
    pub const fn with_priority(mut self, priority: i16) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the operator-facing retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Service-level errors for queue operations.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// Domain transition failed.
    #[error(transparent)]
    Domain(#[from] JobDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] JobRepositoryError),
}

/// Result type for queue service operations.
pub type JobQueueResult<T> = Result<T, JobQueueError>;

/// Job queue orchestration service.
///
/// All concurrency-sensitive work (claiming, first-outcome-wins completion)
/// is delegated to the repository; this service adds clocking, dispatch, and
/// logging.
#[derive(Clone)]
pub struct JobQueueService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    registry: Arc<HandlerRegistry>,
}

impl<R, C> JobQueueService<R, C>
where
    R: JobRepository,
    C: Clock + Send + Sync,
{
    /// Creates a queue service over a repository, clock, and handler map.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            repository,
            clock,
            registry,
        }
    }

    /// Returns the handler registry used for completion dispatch.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Creates a pending job; side-effect free otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Repository`] when persistence fails.
    pub async fn enqueue(&self, request: EnqueueJobRequest) -> JobQueueResult<Job> {
        let job = Job::new(
            request.server_id,
            request.tenant_id,
            request.job_type,
            request.payload,
            request.priority,
            request.max_retries,
            self.clock.utc(),
        );
        self.repository.insert(&job).await?;
        info!(job_id = %job.id(), job_type = job.job_type(), server_id = %job.server_id(), "job enqueued");
        Ok(job)
    }

    /// Atomically claims up to `limit` jobs for a server, in (priority,
    /// creation time) order.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Repository`] when the claim fails.
    pub async fn fetch(&self, server_id: ServerId, limit: usize) -> JobQueueResult<Vec<Job>> {
        let jobs = self
            .repository
            .claim_pending(server_id, limit, self.clock.utc())
            .await?;
        if !jobs.is_empty() {
            info!(server_id = %server_id, count = jobs.len(), "jobs claimed");
        }
        Ok(jobs)
    }

    /// Applies a completion report from the owning server and, when the
    /// outcome was newly applied, dispatches the type-keyed handler.
    ///
    /// Duplicate reports surface as [`CompletionApply::Conflict`] and do not
    /// re-dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Repository`] with
    /// [`JobRepositoryError::NotFound`] when the job does not belong to the
    /// reporting server.
    pub async fn complete(
        &self,
        job_id: JobId,
        server_id: ServerId,
        outcome: JobOutcome,
    ) -> JobQueueResult<CompletionApply> {
        let applied = self
            .repository
            .complete(job_id, server_id, &outcome, self.clock.utc())
            .await?;
        match &applied {
            CompletionApply::Applied(job) => {
                info!(
                    job_id = %job.id(),
                    job_type = job.job_type(),
                    status = %job.status(),
                    "job completed"
                );
                self.registry.dispatch(job).await;
            }
            CompletionApply::Conflict(job) => {
                warn!(
                    job_id = %job.id(),
                    status = %job.status(),
                    "duplicate completion report ignored"
                );
            }
        }
        Ok(applied)
    }

    /// Withdraws an unclaimed job (operator action).
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Repository`] when the job is missing and
    /// [`JobQueueError::Domain`] when it is no longer claimable.
    pub async fn cancel(&self, job_id: JobId) -> JobQueueResult<Job> {
        let mut job = self
            .repository
            .find_by_id(job_id)
            .await?
            .ok_or(JobRepositoryError::NotFound(job_id))?;
        job.cancel(self.clock.utc())?;
        self.repository.update(&job).await?;
        info!(job_id = %job.id(), "job cancelled");
        Ok(job)
    }

    /// Finds a job by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Repository`] when lookup fails.
    pub async fn find(&self, job_id: JobId) -> JobQueueResult<Option<Job>> {
        Ok(self.repository.find_by_id(job_id).await?)
    }
}
