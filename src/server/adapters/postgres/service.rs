//! `PostgreSQL` repository implementation for installed services.

use super::{models::ServiceRow, schema::services};
use crate::job::adapters::postgres::JobPgPool;
use crate::server::domain::{PersistedServiceData, ServerId, Service, ServiceId, ServiceStatus};
use crate::server::ports::{ServiceRepository, ServiceRepositoryError, ServiceRepositoryResult};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;

/// `PostgreSQL`-backed installed-service repository.
#[derive(Debug, Clone)]
pub struct PostgresServiceRepository {
    pool: JobPgPool,
}

impl PostgresServiceRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ServiceRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ServiceRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ServiceRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ServiceRepositoryError::persistence)?
    }
}

#[async_trait]
impl ServiceRepository for PostgresServiceRepository {
    async fn insert(&self, service: &Service) -> ServiceRepositoryResult<()> {
        let row = to_row(service);
        self.run_blocking(move |connection| {
            diesel::insert_into(services::table)
                .values(&row)
                .execute(connection)
                .map_err(ServiceRepositoryError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn update(&self, service: &Service) -> ServiceRepositoryResult<()> {
        let row = to_row(service);
        let service_id = service.id();
        self.run_blocking(move |connection| {
            let affected = diesel::update(services::table.filter(services::id.eq(row.id)))
                .set((
                    services::version.eq(row.version),
                    services::status.eq(row.status),
                    services::error.eq(row.error),
                    services::updated_at.eq(row.updated_at),
                ))
                .execute(connection)
                .map_err(ServiceRepositoryError::persistence)?;
            if affected == 0 {
                return Err(ServiceRepositoryError::NotFound(service_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_name(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> ServiceRepositoryResult<Option<Service>> {
        let server_uuid = server_id.into_inner();
        let name = name.to_owned();
        self.run_blocking(move |connection| {
            let row: Option<ServiceRow> = services::table
                .filter(services::server_id.eq(server_uuid))
                .filter(services::name.eq(name))
                .select(ServiceRow::as_select())
                .first(connection)
                .optional()
                .map_err(ServiceRepositoryError::persistence)?;
            row.map(row_to_service).transpose()
        })
        .await
    }

    async fn list_for_server(&self, server_id: ServerId) -> ServiceRepositoryResult<Vec<Service>> {
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<ServiceRow> = services::table
                .filter(services::server_id.eq(server_uuid))
                .order(services::name.asc())
                .select(ServiceRow::as_select())
                .load(connection)
                .map_err(ServiceRepositoryError::persistence)?;
            rows.into_iter().map(row_to_service).collect()
        })
        .await
    }
}

fn to_row(service: &Service) -> ServiceRow {
    ServiceRow {
        id: service.id().into_inner(),
        server_id: service.server_id().into_inner(),
        name: service.name().to_owned(),
        version: service.version().map(ToOwned::to_owned),
        status: service.status().as_str().to_owned(),
        error: service.error().map(ToOwned::to_owned),
        created_at: service.created_at(),
        updated_at: service.updated_at(),
    }
}

fn row_to_service(row: ServiceRow) -> ServiceRepositoryResult<Service> {
    let status = ServiceStatus::try_from(row.status.as_str())
        .map_err(ServiceRepositoryError::persistence)?;

    Ok(Service::from_persisted(PersistedServiceData {
        id: ServiceId::from_uuid(row.id),
        server_id: ServerId::from_uuid(row.server_id),
        name: row.name,
        version: row.version,
        status,
        error: row.error,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
