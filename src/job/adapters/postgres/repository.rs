//! `PostgreSQL` repository implementation for the job queue.
//!
//! Claim atomicity rides on `FOR UPDATE SKIP LOCKED`: overlapping polls for
//! the same server lock disjoint rows, so no job is ever handed out twice.

use super::{
    models::{JobRow, NewJobRow},
    schema::jobs,
};
use crate::job::domain::{Job, JobId, JobOutcome, JobStatus, PersistedJobData};
use crate::job::ports::{CompletionApply, JobRepository, JobRepositoryError, JobRepositoryResult};
use crate::server::domain::{ServerId, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

/// `PostgreSQL` connection pool type used by fleetward adapters.
pub type JobPgPool = Pool<ConnectionManager<PgConnection>>;

impl From<DieselError> for JobRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// `PostgreSQL`-backed job repository.
#[derive(Debug, Clone)]
pub struct PostgresJobRepository {
    pool: JobPgPool,
}

impl PostgresJobRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> JobRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> JobRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(JobRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(JobRepositoryError::persistence)?
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn insert(&self, job: &Job) -> JobRepositoryResult<()> {
        let job_id = job.id();
        let new_row = to_new_row(job);
        self.run_blocking(move |connection| {
            diesel::insert_into(jobs::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        JobRepositoryError::DuplicateJob(job_id)
                    }
                    _ => JobRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn claim_pending(
        &self,
        server_id: ServerId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> JobRepositoryResult<Vec<Job>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            connection.transaction::<Vec<Job>, JobRepositoryError, _>(|connection| {
                let claimable = [
                    JobStatus::Pending.as_str(),
                    JobStatus::Queued.as_str(),
                ];
                let ids: Vec<Uuid> = jobs::table
                    .filter(jobs::server_id.eq(server_uuid))
                    .filter(jobs::status.eq_any(claimable))
                    .order((jobs::priority.asc(), jobs::created_at.asc()))
                    .limit(limit)
                    .select(jobs::id)
                    .for_update()
                    .skip_locked()
                    .load(connection)?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }

                diesel::update(jobs::table.filter(jobs::id.eq_any(ids.clone())))
                    .set((
                        jobs::status.eq(JobStatus::Running.as_str()),
                        jobs::started_at.eq(now),
                    ))
                    .execute(connection)?;

                let rows: Vec<JobRow> = jobs::table
                    .filter(jobs::id.eq_any(ids))
                    .order((jobs::priority.asc(), jobs::created_at.asc()))
                    .select(JobRow::as_select())
                    .load(connection)?;
                rows.into_iter().map(row_to_job).collect()
            })
        })
        .await
    }

    async fn complete(
        &self,
        job_id: JobId,
        server_id: ServerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> JobRepositoryResult<CompletionApply> {
        let job_uuid = job_id.into_inner();
        let server_uuid = server_id.into_inner();
        let outcome = outcome.clone();
        self.run_blocking(move |connection| {
            connection.transaction::<CompletionApply, JobRepositoryError, _>(|connection| {
                let row: Option<JobRow> = jobs::table
                    .filter(jobs::id.eq(job_uuid))
                    .filter(jobs::server_id.eq(server_uuid))
                    .select(JobRow::as_select())
                    .for_update()
                    .first(connection)
                    .optional()?;
                let Some(row) = row else {
                    return Err(JobRepositoryError::NotFound(job_id));
                };

                let mut job = row_to_job(row)?;
                if job.is_terminal() {
                    return Ok(CompletionApply::Conflict(job));
                }
                job.finish(&outcome, now)
                    .map_err(JobRepositoryError::persistence)?;

                diesel::update(jobs::table.filter(jobs::id.eq(job_uuid)))
                    .set((
                        jobs::status.eq(job.status().as_str()),
                        jobs::output.eq(job.output().map(ToOwned::to_owned)),
                        jobs::error.eq(job.error().map(ToOwned::to_owned)),
                        jobs::exit_code.eq(job.exit_code()),
                        jobs::completed_at.eq(job.completed_at()),
                    ))
                    .execute(connection)?;
                Ok(CompletionApply::Applied(job))
            })
        })
        .await
    }

    async fn find_by_id(&self, id: JobId) -> JobRepositoryResult<Option<Job>> {
        let job_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<JobRow> = jobs::table
                .filter(jobs::id.eq(job_uuid))
                .select(JobRow::as_select())
                .first(connection)
                .optional()?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn list_for_server(&self, server_id: ServerId) -> JobRepositoryResult<Vec<Job>> {
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<JobRow> = jobs::table
                .filter(jobs::server_id.eq(server_uuid))
                .order(jobs::created_at.desc())
                .select(JobRow::as_select())
                .load(connection)?;
            rows.into_iter().map(row_to_job).collect()
        })
        .await
    }

    async fn update(&self, job: &Job) -> JobRepositoryResult<()> {
        let job_id = job.id();
        let row = to_new_row(job);
        self.run_blocking(move |connection| {
            let affected = diesel::update(jobs::table.filter(jobs::id.eq(row.id)))
                .set((
                    jobs::status.eq(row.status),
                    jobs::retry_count.eq(row.retry_count),
                    jobs::output.eq(row.output),
                    jobs::error.eq(row.error),
                    jobs::exit_code.eq(row.exit_code),
                    jobs::started_at.eq(row.started_at),
                    jobs::completed_at.eq(row.completed_at),
                ))
                .execute(connection)?;
            if affected == 0 {
                return Err(JobRepositoryError::NotFound(job_id));
            }
            Ok(())
        })
        .await
    }
}

fn to_new_row(job: &Job) -> NewJobRow {
    NewJobRow {
        id: job.id().into_inner(),
        server_id: job.server_id().into_inner(),
        tenant_id: job.tenant_id().into_inner(),
        job_type: job.job_type().to_owned(),
        payload: job.payload().clone(),
        status: job.status().as_str().to_owned(),
        priority: job.priority(),
        retry_count: job.retry_count(),
        max_retries: job.max_retries(),
        output: job.output().map(ToOwned::to_owned),
        error: job.error().map(ToOwned::to_owned),
        exit_code: job.exit_code(),
        created_at: job.created_at(),
        queued_at: job.queued_at(),
        started_at: job.started_at(),
        completed_at: job.completed_at(),
    }
}

fn row_to_job(row: JobRow) -> JobRepositoryResult<Job> {
    let status = JobStatus::try_from(row.status.as_str())
        .map_err(JobRepositoryError::persistence)?;
    Ok(Job::from_persisted(PersistedJobData {
        id: JobId::from_uuid(row.id),
        server_id: ServerId::from_uuid(row.server_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        job_type: row.job_type,
        payload: row.payload,
        status,
        priority: row.priority,
        retry_count: row.retry_count,
        max_retries: row.max_retries,
        output: row.output,
        error: row.error,
        exit_code: row.exit_code,
        created_at: row.created_at,
        queued_at: row.queued_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
    }))
}
