//! `PostgreSQL` repository implementation for servers.

use super::{models::ServerRow, schema::servers};
use crate::job::adapters::postgres::JobPgPool;
use crate::server::domain::{
    PersistedServerData, ProvisioningPhase, Server, ServerId, ServerStatus, TenantId,
};
use crate::server::ports::{ServerRepository, ServerRepositoryError, ServerRepositoryResult};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL`-backed server repository.
#[derive(Debug, Clone)]
pub struct PostgresServerRepository {
    pool: JobPgPool,
}

impl PostgresServerRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ServerRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ServerRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ServerRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ServerRepositoryError::persistence)?
    }
}

#[async_trait]
impl ServerRepository for PostgresServerRepository {
    async fn insert(&self, server: &Server) -> ServerRepositoryResult<()> {
        let row = to_row(server)?;
        let server_id = server.id();
        self.run_blocking(move |connection| {
            diesel::insert_into(servers::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match &err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ServerRepositoryError::DuplicateServer(server_id)
                    }
                    _ => ServerRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, server: &Server) -> ServerRepositoryResult<()> {
        let row = to_row(server)?;
        let server_id = server.id();
        self.run_blocking(move |connection| {
            let affected = diesel::update(servers::table.filter(servers::id.eq(row.id)))
                .set((
                    servers::status.eq(row.status),
                    servers::phase.eq(row.phase),
                    servers::provision_token_digest.eq(row.provision_token_digest),
                    servers::provision_token_expires_at.eq(row.provision_token_expires_at),
                    servers::agent_token_digest.eq(row.agent_token_digest),
                    servers::ip_address.eq(row.ip_address),
                    servers::public_key.eq(row.public_key),
                    servers::specs.eq(row.specs),
                    servers::services_status.eq(row.services_status),
                    servers::daemons_status.eq(row.daemons_status),
                    servers::tools_status.eq(row.tools_status),
                    servers::database_health.eq(row.database_health),
                    servers::last_heartbeat_at.eq(row.last_heartbeat_at),
                    servers::updated_at.eq(row.updated_at),
                ))
                .execute(connection)
                .map_err(ServerRepositoryError::persistence)?;
            if affected == 0 {
                return Err(ServerRepositoryError::NotFound(server_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: ServerId) -> ServerRepositoryResult<Option<Server>> {
        let server_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<ServerRow> = servers::table
                .filter(servers::id.eq(server_uuid))
                .select(ServerRow::as_select())
                .first(connection)
                .optional()
                .map_err(ServerRepositoryError::persistence)?;
            row.map(row_to_server).transpose()
        })
        .await
    }

    async fn find_by_provision_token_digest(
        &self,
        digest: &str,
    ) -> ServerRepositoryResult<Option<Server>> {
        let digest = digest.to_owned();
        self.run_blocking(move |connection| {
            let row: Option<ServerRow> = servers::table
                .filter(servers::provision_token_digest.eq(digest))
                .select(ServerRow::as_select())
                .first(connection)
                .optional()
                .map_err(ServerRepositoryError::persistence)?;
            row.map(row_to_server).transpose()
        })
        .await
    }

    async fn find_by_agent_token_digest(
        &self,
        digest: &str,
    ) -> ServerRepositoryResult<Option<Server>> {
        let digest = digest.to_owned();
        self.run_blocking(move |connection| {
            let row: Option<ServerRow> = servers::table
                .filter(servers::agent_token_digest.eq(digest))
                .select(ServerRow::as_select())
                .first(connection)
                .optional()
                .map_err(ServerRepositoryError::persistence)?;
            row.map(row_to_server).transpose()
        })
        .await
    }
}

fn to_row(server: &Server) -> ServerRepositoryResult<ServerRow> {
    let stack =
        serde_json::to_value(server.stack()).map_err(ServerRepositoryError::persistence)?;
    let specs = server
        .specs()
        .map(serde_json::to_value)
        .transpose()
        .map_err(ServerRepositoryError::persistence)?;
    let services_status = serde_json::to_value(server.services_status())
        .map_err(ServerRepositoryError::persistence)?;
    let daemons_status = serde_json::to_value(server.daemons_status())
        .map_err(ServerRepositoryError::persistence)?;
    let tools_status =
        serde_json::to_value(server.tools_status()).map_err(ServerRepositoryError::persistence)?;

    Ok(ServerRow {
        id: server.id().into_inner(),
        tenant_id: server.tenant_id().into_inner(),
        name: server.name().to_owned(),
        status: server.status().as_str().to_owned(),
        phase: server.phase().as_str().to_owned(),
        stack,
        provision_token_digest: server.provision_token_digest().map(ToOwned::to_owned),
        provision_token_expires_at: server.provision_token_expires_at(),
        agent_token_digest: server.agent_token_digest().map(ToOwned::to_owned),
        ip_address: server.ip_address().map(ToOwned::to_owned),
        public_key: server.public_key().map(ToOwned::to_owned),
        specs,
        services_status,
        daemons_status,
        tools_status,
        database_health: server.database_health().map(ToOwned::to_owned),
        last_heartbeat_at: server.last_heartbeat_at(),
        created_at: server.created_at(),
        updated_at: server.updated_at(),
    })
}

fn row_to_server(row: ServerRow) -> ServerRepositoryResult<Server> {
    let status = ServerStatus::try_from(row.status.as_str())
        .map_err(ServerRepositoryError::persistence)?;
    let phase = ProvisioningPhase::try_from(row.phase.as_str())
        .map_err(ServerRepositoryError::persistence)?;
    let stack = serde_json::from_value(row.stack).map_err(ServerRepositoryError::persistence)?;
    let specs = row
        .specs
        .map(serde_json::from_value)
        .transpose()
        .map_err(ServerRepositoryError::persistence)?;
    let services_status =
        serde_json::from_value(row.services_status).map_err(ServerRepositoryError::persistence)?;
    let daemons_status =
        serde_json::from_value(row.daemons_status).map_err(ServerRepositoryError::persistence)?;
    let tools_status =
        serde_json::from_value(row.tools_status).map_err(ServerRepositoryError::persistence)?;

    Ok(Server::from_persisted(PersistedServerData {
        id: ServerId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        name: row.name,
        status,
        phase,
        stack,
        provision_token_digest: row.provision_token_digest,
        provision_token_expires_at: row.provision_token_expires_at,
        agent_token_digest: row.agent_token_digest,
        ip_address: row.ip_address,
        public_key: row.public_key,
        specs,
        services_status,
        daemons_status,
        tools_status,
        database_health: row.database_health,
        last_heartbeat_at: row.last_heartbeat_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
