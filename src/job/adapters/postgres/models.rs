//! Diesel row models for job persistence.

use super::schema::jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for job records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Target server.
    pub server_id: uuid::Uuid,
    /// Owning tenant.
    pub tenant_id: uuid::Uuid,
    /// Job type tag.
    pub job_type: String,
    /// Opaque payload.
    pub payload: Value,
    /// Lifecycle status.
    pub status: String,
    /// Priority.
    pub priority: i16,
    /// Re-enqueue bookkeeping.
    pub retry_count: i32,
    /// Retry budget.
    pub max_retries: i32,
    /// Captured remote output.
    pub output: Option<String>,
    /// Agent-reported error text.
    pub error: Option<String>,
    /// Remote process exit code.
    pub exit_code: Option<i32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Queue-acceptance timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert model for job records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Target server.
    pub server_id: uuid::Uuid,
    /// Owning tenant.
    pub tenant_id: uuid::Uuid,
    /// Job type tag.
    pub job_type: String,
    /// Opaque payload.
    pub payload: Value,
    /// Lifecycle status.
    pub status: String,
    /// Priority.
    pub priority: i16,
    /// Re-enqueue bookkeeping.
    pub retry_count: i32,
    /// Retry budget.
    pub max_retries: i32,
    /// Captured remote output.
    pub output: Option<String>,
    /// Agent-reported error text.
    pub error: Option<String>,
    /// Remote process exit code.
    pub exit_code: Option<i32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Queue-acceptance timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}
