//! `PostgreSQL` repository implementation for web apps.

use super::{models::WebAppRow, schema::web_apps};
use crate::apps::domain::{
    AppId, AppRuntime, PersistedWebAppData, WebApp, WebAppStatus,
};
use crate::apps::ports::{WebAppRepository, WebAppRepositoryError, WebAppRepositoryResult};
use crate::job::adapters::postgres::JobPgPool;
use crate::server::domain::{ServerId, TenantId};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Partial unique index guarding one live app per (server, domain).
const LIVE_DOMAIN_INDEX: &str = "web_apps_server_domain_live_idx";

/// `PostgreSQL`-backed web app repository.
#[derive(Debug, Clone)]
pub struct PostgresWebAppRepository {
    pool: JobPgPool,
}

impl PostgresWebAppRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> WebAppRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> WebAppRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WebAppRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(WebAppRepositoryError::persistence)?
    }
}

#[async_trait]
impl WebAppRepository for PostgresWebAppRepository {
    async fn insert(&self, app: &WebApp) -> WebAppRepositoryResult<()> {
        let row = to_row(app);
        let app_id = app.id();
        let server_id = app.server_id();
        let domain = app.domain().to_owned();
        self.run_blocking(move |connection| {
            diesel::insert_into(web_apps::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match &err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                        if info.constraint_name() == Some(LIVE_DOMAIN_INDEX) {
                            WebAppRepositoryError::DuplicateDomain { server_id, domain }
                        } else {
                            WebAppRepositoryError::DuplicateApp(app_id)
                        }
                    }
                    _ => WebAppRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, app: &WebApp) -> WebAppRepositoryResult<()> {
        let row = to_row(app);
        let app_id = app.id();
        self.run_blocking(move |connection| {
            let affected = diesel::update(web_apps::table.filter(web_apps::id.eq(row.id)))
                .set((
                    web_apps::port.eq(row.port),
                    web_apps::status.eq(row.status),
                    web_apps::error.eq(row.error),
                    web_apps::updated_at.eq(row.updated_at),
                ))
                .execute(connection)
                .map_err(WebAppRepositoryError::persistence)?;
            if affected == 0 {
                return Err(WebAppRepositoryError::NotFound(app_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: AppId) -> WebAppRepositoryResult<Option<WebApp>> {
        let app_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<WebAppRow> = web_apps::table
                .filter(web_apps::id.eq(app_uuid))
                .select(WebAppRow::as_select())
                .first(connection)
                .optional()
                .map_err(WebAppRepositoryError::persistence)?;
            row.map(row_to_app).transpose()
        })
        .await
    }

    async fn list_for_server(&self, server_id: ServerId) -> WebAppRepositoryResult<Vec<WebApp>> {
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<WebAppRow> = web_apps::table
                .filter(web_apps::server_id.eq(server_uuid))
                .order(web_apps::created_at.asc())
                .select(WebAppRow::as_select())
                .load(connection)
                .map_err(WebAppRepositoryError::persistence)?;
            rows.into_iter().map(row_to_app).collect()
        })
        .await
    }
}

fn to_row(app: &WebApp) -> WebAppRow {
    WebAppRow {
        id: app.id().into_inner(),
        server_id: app.server_id().into_inner(),
        tenant_id: app.tenant_id().into_inner(),
        domain: app.domain().to_owned(),
        system_user: app.system_user().to_owned(),
        runtime: app.runtime().as_str().to_owned(),
        port: app.port().map(i32::from),
        status: app.status().as_str().to_owned(),
        error: app.error().map(ToOwned::to_owned),
        created_at: app.created_at(),
        updated_at: app.updated_at(),
    }
}

fn row_to_app(row: WebAppRow) -> WebAppRepositoryResult<WebApp> {
    let runtime = AppRuntime::try_from(row.runtime.as_str())
        .map_err(WebAppRepositoryError::persistence)?;
    let status = WebAppStatus::try_from(row.status.as_str())
        .map_err(WebAppRepositoryError::persistence)?;
    let port = row
        .port
        .map(u16::try_from)
        .transpose()
        .map_err(WebAppRepositoryError::persistence)?;

    Ok(WebApp::from_persisted(PersistedWebAppData {
        id: AppId::from_uuid(row.id),
        server_id: ServerId::from_uuid(row.server_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        domain: row.domain,
        system_user: row.system_user,
        runtime,
        port,
        status,
        error: row.error,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
