//! Diesel row models for server persistence.

use super::schema::{provisioning_steps, server_metrics, servers, services};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query and insert row for servers.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServerRow {
    /// Server identifier.
    pub id: uuid::Uuid,
    /// Owning tenant.
    pub tenant_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Provisioning phase.
    pub phase: String,
    /// Tenant stack selection.
    pub stack: serde_json::Value,
    /// Outstanding provision-token digest.
    pub provision_token_digest: Option<String>,
    /// Provision-token expiry.
    pub provision_token_expires_at: Option<DateTime<Utc>>,
    /// Agent bearer-token digest.
    pub agent_token_digest: Option<String>,
    /// Agent-reported address.
    pub ip_address: Option<String>,
    /// Agent public key.
    pub public_key: Option<String>,
    /// Observed hardware facts.
    pub specs: Option<serde_json::Value>,
    /// Observed per-service status map.
    pub services_status: serde_json::Value,
    /// Observed per-daemon status map.
    pub daemons_status: serde_json::Value,
    /// Observed tool-version map.
    pub tools_status: serde_json::Value,
    /// Agent-reported database health summary.
    pub database_health: Option<String>,
    /// Last-heartbeat timestamp.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for provisioning steps.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = provisioning_steps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StepRow {
    /// Step identifier.
    pub id: uuid::Uuid,
    /// Owning server.
    pub server_id: uuid::Uuid,
    /// Step type tag.
    pub step_type: String,
    /// Catalog category.
    pub category: String,
    /// Catalog order.
    pub step_order: i16,
    /// Required flag.
    pub is_required: bool,
    /// Lifecycle status.
    pub status: String,
    /// Linked job while in flight.
    pub job_id: Option<uuid::Uuid>,
    /// Remote output.
    pub output: Option<String>,
    /// Remote error.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Query and insert row for installed services.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = services)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServiceRow {
    /// Service identifier.
    pub id: uuid::Uuid,
    /// Owning server.
    pub server_id: uuid::Uuid,
    /// Service name.
    pub name: String,
    /// Installed version.
    pub version: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Install failure text.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert row for heartbeat samples.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = server_metrics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MetricRow {
    /// Sample identifier.
    pub id: uuid::Uuid,
    /// Reporting server.
    pub server_id: uuid::Uuid,
    /// CPU utilisation percentage.
    pub cpu_pct: Option<f32>,
    /// Memory utilisation percentage.
    pub memory_pct: Option<f32>,
    /// Disk utilisation percentage.
    pub disk_pct: Option<f32>,
    /// Append timestamp.
    pub recorded_at: DateTime<Utc>,
}
