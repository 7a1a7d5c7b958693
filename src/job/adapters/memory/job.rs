//! In-memory job repository for tests and reference semantics.

use crate::job::domain::{Job, JobId, JobOutcome};
use crate::job::ports::{CompletionApply, JobRepository, JobRepositoryError, JobRepositoryResult};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory job repository.
///
/// The single write lock is what makes claiming and completion atomic here;
/// the `PostgreSQL` adapter achieves the same with row locks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobRepository {
    state: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl InMemoryJobRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> JobRepositoryError {
    JobRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: &Job) -> JobRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.contains_key(&job.id()) {
            return Err(JobRepositoryError::DuplicateJob(job.id()));
        }
        state.insert(job.id(), job.clone());
        Ok(())
    }

    async fn claim_pending(
        &self,
        server_id: ServerId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> JobRepositoryResult<Vec<Job>> {
        let mut state = self.state.write().map_err(lock_poisoned)?;

        let mut claimable: Vec<JobId> = state
            .values()
            .filter(|job| job.server_id() == server_id && job.status().is_claimable())
            .map(Job::id)
            .collect();
        claimable.sort_by_key(|id| {
            state
                .get(id)
                .map(|job| (job.priority(), job.created_at(), job.id()))
        });
        claimable.truncate(limit);

        let mut claimed = Vec::with_capacity(claimable.len());
        for id in claimable {
            if let Some(job) = state.get_mut(&id) {
                job.claim(now)
                    .map_err(JobRepositoryError::persistence)?;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete(
        &self,
        job_id: JobId,
        server_id: ServerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> JobRepositoryResult<CompletionApply> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        let Some(job) = state.get_mut(&job_id) else {
            return Err(JobRepositoryError::NotFound(job_id));
        };
        if job.server_id() != server_id {
            // Ownership failures look like absence so one tenant's agent
            // cannot probe another's job identifiers.
            return Err(JobRepositoryError::NotFound(job_id));
        }
        if job.is_terminal() {
            return Ok(CompletionApply::Conflict(job.clone()));
        }
        job.finish(outcome, now)
            .map_err(JobRepositoryError::persistence)?;
        Ok(CompletionApply::Applied(job.clone()))
    }

    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.get(&id).cloned())
    }

    async fn list_for_server(&self, server_id: ServerId) -> JobRepositoryResult<Vec<Job>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut jobs: Vec<Job> = state
            .values()
            .filter(|job| job.server_id() == server_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(jobs)
    }

    async fn update(&self, job: &Job) -> JobRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&job.id()) {
            return Err(JobRepositoryError::NotFound(job.id()));
        }
        state.insert(job.id(), job.clone());
        Ok(())
    }
}
