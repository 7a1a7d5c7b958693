//! Diesel row models for app persistence.

use super::schema::{app_processes, web_apps};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query and insert row for web apps.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = web_apps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebAppRow {
    /// App identifier.
    pub id: uuid::Uuid,
    /// Hosting server.
    pub server_id: uuid::Uuid,
    /// Owning tenant.
    pub tenant_id: uuid::Uuid,
    /// Site domain.
    pub domain: String,
    /// System user.
    pub system_user: String,
    /// Runtime tag.
    pub runtime: String,
    /// Allocated port.
    pub port: Option<i32>,
    /// Creation status.
    pub status: String,
    /// Remote error text.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for supervised processes.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = app_processes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProcessRow {
    /// Process identifier.
    pub id: uuid::Uuid,
    /// Hosting server.
    pub server_id: uuid::Uuid,
    /// Owning app.
    pub app_id: Option<uuid::Uuid>,
    /// Supervisor program name.
    pub name: String,
    /// Supervised command line.
    pub command: String,
    /// Reserved port.
    pub port: Option<i32>,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}
