//! Diesel row models for firewall rule persistence.

use super::schema::firewall_rules;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for firewall rules.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = firewall_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RuleRow {
    /// Rule identifier.
    pub id: uuid::Uuid,
    /// Owning server.
    pub server_id: uuid::Uuid,
    /// Owning tenant.
    pub tenant_id: uuid::Uuid,
    /// Packet direction.
    pub direction: String,
    /// Allow or deny.
    pub action: String,
    /// Transport protocol.
    pub protocol: String,
    /// Port specification.
    pub port_spec: String,
    /// Source specification.
    pub source: String,
    /// Live flag.
    pub is_active: bool,
    /// Pending-confirmation flag.
    pub is_pending_confirmation: bool,
    /// Confirmation-token digest.
    pub confirmation_token_digest: Option<String>,
    /// Confirmation deadline.
    pub confirmation_expires_at: Option<DateTime<Utc>>,
    /// Rollback reason.
    pub rollback_reason: Option<String>,
    /// Rollback timestamp.
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Evaluation order.
    pub rule_order: i16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for firewall rules.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = firewall_rules)]
pub struct NewRuleRow {
    /// Rule identifier.
    pub id: uuid::Uuid,
    /// Owning server.
    pub server_id: uuid::Uuid,
    /// Owning tenant.
    pub tenant_id: uuid::Uuid,
    /// Packet direction.
    pub direction: String,
    /// Allow or deny.
    pub action: String,
    /// Transport protocol.
    pub protocol: String,
    /// Port specification.
    pub port_spec: String,
    /// Source specification.
    pub source: String,
    /// Live flag.
    pub is_active: bool,
    /// Pending-confirmation flag.
    pub is_pending_confirmation: bool,
    /// Confirmation-token digest.
    pub confirmation_token_digest: Option<String>,
    /// Confirmation deadline.
    pub confirmation_expires_at: Option<DateTime<Utc>>,
    /// Rollback reason.
    pub rollback_reason: Option<String>,
    /// Rollback timestamp.
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Evaluation order.
    pub rule_order: i16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}
