//! `PostgreSQL` repository implementation for provisioning steps.

use super::{models::StepRow, schema::provisioning_steps};
use crate::job::adapters::postgres::JobPgPool;
use crate::job::domain::JobId;
use crate::server::domain::{
    PersistedStepData, ProvisioningStep, ServerId, StepCategory, StepId, StepStatus,
};
use crate::server::ports::{ProvisioningStepRepository, StepRepositoryError, StepRepositoryResult};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;

/// `PostgreSQL`-backed provisioning step repository.
#[derive(Debug, Clone)]
pub struct PostgresStepRepository {
    pool: JobPgPool,
}

impl PostgresStepRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> StepRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StepRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StepRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(StepRepositoryError::persistence)?
    }
}

#[async_trait]
impl ProvisioningStepRepository for PostgresStepRepository {
    async fn insert_batch(&self, steps: &[ProvisioningStep]) -> StepRepositoryResult<()> {
        let rows: Vec<StepRow> = steps.iter().map(to_row).collect();
        self.run_blocking(move |connection| {
            diesel::insert_into(provisioning_steps::table)
                .values(&rows)
                .execute(connection)
                .map_err(StepRepositoryError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn update(&self, step: &ProvisioningStep) -> StepRepositoryResult<()> {
        let row = to_row(step);
        let step_id = step.id();
        self.run_blocking(move |connection| {
            let affected =
                diesel::update(provisioning_steps::table.filter(provisioning_steps::id.eq(row.id)))
                    .set((
                        provisioning_steps::status.eq(row.status),
                        provisioning_steps::job_id.eq(row.job_id),
                        provisioning_steps::output.eq(row.output),
                        provisioning_steps::error.eq(row.error),
                        provisioning_steps::started_at.eq(row.started_at),
                        provisioning_steps::completed_at.eq(row.completed_at),
                    ))
                    .execute(connection)
                    .map_err(StepRepositoryError::persistence)?;
            if affected == 0 {
                return Err(StepRepositoryError::NotFound(step_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: StepId) -> StepRepositoryResult<Option<ProvisioningStep>> {
        let step_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<StepRow> = provisioning_steps::table
                .filter(provisioning_steps::id.eq(step_uuid))
                .select(StepRow::as_select())
                .first(connection)
                .optional()
                .map_err(StepRepositoryError::persistence)?;
            row.map(row_to_step).transpose()
        })
        .await
    }

    async fn find_by_job(&self, job_id: JobId) -> StepRepositoryResult<Option<ProvisioningStep>> {
        let job_uuid = job_id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<StepRow> = provisioning_steps::table
                .filter(provisioning_steps::job_id.eq(job_uuid))
                .select(StepRow::as_select())
                .first(connection)
                .optional()
                .map_err(StepRepositoryError::persistence)?;
            row.map(row_to_step).transpose()
        })
        .await
    }

    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> StepRepositoryResult<Vec<ProvisioningStep>> {
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<StepRow> = provisioning_steps::table
                .filter(provisioning_steps::server_id.eq(server_uuid))
                .order(provisioning_steps::step_order.asc())
                .select(StepRow::as_select())
                .load(connection)
                .map_err(StepRepositoryError::persistence)?;
            rows.into_iter().map(row_to_step).collect()
        })
        .await
    }
}

fn to_row(step: &ProvisioningStep) -> StepRow {
    StepRow {
        id: step.id().into_inner(),
        server_id: step.server_id().into_inner(),
        step_type: step.step_type().to_owned(),
        category: step.category().as_str().to_owned(),
        step_order: step.order(),
        is_required: step.is_required(),
        status: step.status().as_str().to_owned(),
        job_id: step.job_id().map(JobId::into_inner),
        output: step.output().map(ToOwned::to_owned),
        error: step.error().map(ToOwned::to_owned),
        created_at: step.created_at(),
        started_at: step.started_at(),
        completed_at: step.completed_at(),
    }
}

fn row_to_step(row: StepRow) -> StepRepositoryResult<ProvisioningStep> {
    let category = StepCategory::try_from(row.category.as_str())
        .map_err(StepRepositoryError::persistence)?;
    let status =
        StepStatus::try_from(row.status.as_str()).map_err(StepRepositoryError::persistence)?;

    Ok(ProvisioningStep::from_persisted(PersistedStepData {
        id: StepId::from_uuid(row.id),
        server_id: ServerId::from_uuid(row.server_id),
        step_type: row.step_type,
        category,
        order: row.step_order,
        is_required: row.is_required,
        status,
        job_id: row.job_id.map(JobId::from_uuid),
        output: row.output,
        error: row.error,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
    }))
}
