//! `PostgreSQL` repository implementation for supervised processes.
//!
//! Port reservation is serialized with a per-server advisory lock taken
//! inside the insert transaction; a unique index on (server_id, port)
//! backstops the check against any path that skips the lock.

use super::{models::ProcessRow, schema::app_processes};
use crate::apps::domain::{
    AppId, AppProcess, PersistedProcessData, ProcessId, ProcessStatus,
};
use crate::apps::ports::{ProcessRepository, ProcessRepositoryError, ProcessRepositoryResult};
use crate::job::adapters::postgres::JobPgPool;
use crate::netpool::ports::{PortUsageError, PortUsageSource};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;
use std::collections::BTreeSet;

/// Unique index guarding one live process per (server, port).
const SERVER_PORT_INDEX: &str = "app_processes_server_port_idx";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// `PostgreSQL`-backed process repository.
#[derive(Debug, Clone)]
pub struct PostgresProcessRepository {
    pool: JobPgPool,
}

impl From<DieselError> for ProcessRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

impl PostgresProcessRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ProcessRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ProcessRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ProcessRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ProcessRepositoryError::persistence)?
    }
}

/// Derives a stable advisory-lock key from the server identifier.
fn server_lock_key(server_id: ServerId) -> i64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in server_id.into_inner().as_bytes() {
        hash = (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME);
    }
    i64::try_from(hash & 0x7FFF_FFFF_FFFF_FFFF).unwrap_or(0)
}

fn lock_server(connection: &mut PgConnection, server_id: ServerId) -> Result<(), DieselError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(server_lock_key(server_id))
        .execute(connection)?;
    Ok(())
}

#[async_trait]
impl PortUsageSource for PostgresProcessRepository {
    async fn used_ports(&self, server_id: ServerId) -> Result<BTreeSet<u16>, PortUsageError> {
        let server_uuid = server_id.into_inner();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PortUsageError::new)?;
            let ports: Vec<Option<i32>> = app_processes::table
                .filter(app_processes::server_id.eq(server_uuid))
                .filter(app_processes::port.is_not_null())
                .select(app_processes::port)
                .load(&mut connection)
                .map_err(PortUsageError::new)?;
            ports
                .into_iter()
                .flatten()
                .map(|port| u16::try_from(port).map_err(PortUsageError::new))
                .collect()
        })
        .await
        .map_err(PortUsageError::new)?
    }
}

#[async_trait]
impl ProcessRepository for PostgresProcessRepository {
    async fn insert(&self, process: &AppProcess) -> ProcessRepositoryResult<()> {
        let row = to_row(process);
        let process_id = process.id();
        let server_id = process.server_id();
        let port = process.port();
        self.run_blocking(move |connection| {
            connection.transaction::<_, ProcessRepositoryError, _>(|conn| {
                if let Some(reserved) = port {
                    lock_server(conn, server_id)?;
                    let taken_count: i64 = app_processes::table
                        .filter(app_processes::server_id.eq(server_id.into_inner()))
                        .filter(app_processes::port.eq(i32::from(reserved)))
                        .count()
                        .get_result(conn)?;
                    if taken_count > 0 {
                        return Err(ProcessRepositoryError::PortInUse {
                            server_id,
                            port: reserved,
                        });
                    }
                }
                diesel::insert_into(app_processes::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(|err| match &err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                            if info.constraint_name() == Some(SERVER_PORT_INDEX) {
                                ProcessRepositoryError::PortInUse {
                                    server_id,
                                    port: port.unwrap_or_default(),
                                }
                            } else {
                                ProcessRepositoryError::DuplicateProcess(process_id)
                            }
                        }
                        _ => ProcessRepositoryError::persistence(err),
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn update(&self, process: &AppProcess) -> ProcessRepositoryResult<()> {
        let row = to_row(process);
        let process_id = process.id();
        self.run_blocking(move |connection| {
            let affected =
                diesel::update(app_processes::table.filter(app_processes::id.eq(row.id)))
                    .set((
                        app_processes::name.eq(row.name),
                        app_processes::command.eq(row.command),
                        app_processes::status.eq(row.status),
                        app_processes::updated_at.eq(row.updated_at),
                    ))
                    .execute(connection)
                    .map_err(ProcessRepositoryError::persistence)?;
            if affected == 0 {
                return Err(ProcessRepositoryError::NotFound(process_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: ProcessId) -> ProcessRepositoryResult<()> {
        let process_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let affected =
                diesel::delete(app_processes::table.filter(app_processes::id.eq(process_uuid)))
                    .execute(connection)
                    .map_err(ProcessRepositoryError::persistence)?;
            if affected == 0 {
                return Err(ProcessRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: ProcessId) -> ProcessRepositoryResult<Option<AppProcess>> {
        let process_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<ProcessRow> = app_processes::table
                .filter(app_processes::id.eq(process_uuid))
                .select(ProcessRow::as_select())
                .first(connection)
                .optional()
                .map_err(ProcessRepositoryError::persistence)?;
            row.map(row_to_process).transpose()
        })
        .await
    }

    async fn find_by_app(&self, app_id: AppId) -> ProcessRepositoryResult<Vec<AppProcess>> {
        let app_uuid = app_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<ProcessRow> = app_processes::table
                .filter(app_processes::app_id.eq(app_uuid))
                .order(app_processes::created_at.asc())
                .select(ProcessRow::as_select())
                .load(connection)
                .map_err(ProcessRepositoryError::persistence)?;
            rows.into_iter().map(row_to_process).collect()
        })
        .await
    }

    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> ProcessRepositoryResult<Vec<AppProcess>> {
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<ProcessRow> = app_processes::table
                .filter(app_processes::server_id.eq(server_uuid))
                .order(app_processes::created_at.asc())
                .select(ProcessRow::as_select())
                .load(connection)
                .map_err(ProcessRepositoryError::persistence)?;
            rows.into_iter().map(row_to_process).collect()
        })
        .await
    }
}

fn to_row(process: &AppProcess) -> ProcessRow {
    ProcessRow {
        id: process.id().into_inner(),
        server_id: process.server_id().into_inner(),
        app_id: process.app_id().map(AppId::into_inner),
        name: process.name().to_owned(),
        command: process.command().to_owned(),
        port: process.port().map(i32::from),
        status: process.status().as_str().to_owned(),
        created_at: process.created_at(),
        updated_at: process.updated_at(),
    }
}

fn row_to_process(row: ProcessRow) -> ProcessRepositoryResult<AppProcess> {
    let status = ProcessStatus::try_from(row.status.as_str())
        .map_err(ProcessRepositoryError::persistence)?;
    let port = row
        .port
        .map(u16::try_from)
        .transpose()
        .map_err(ProcessRepositoryError::persistence)?;

    Ok(AppProcess::from_persisted(PersistedProcessData {
        id: ProcessId::from_uuid(row.id),
        server_id: ServerId::from_uuid(row.server_id),
        app_id: row.app_id.map(AppId::from_uuid),
        name: row.name,
        command: row.command,
        port,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
