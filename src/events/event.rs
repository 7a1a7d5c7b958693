//! Domain events published after state transitions commit.

use crate::firewall::domain::RuleId;
use crate::job::domain::JobId;
use crate::server::domain::{ProvisioningPhase, ServerId, ServerStatus, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbound notification of a committed state transition.
///
/// Events replace inline notification side effects: they are published after
/// the owning transition is durable and consumed asynchronously, so delivery
/// failures can never roll back or block control-plane responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A server's lifecycle status changed.
    ServerStatusChanged {
        /// Affected server.
        server_id: ServerId,
        /// Owning tenant, for notification routing.
        tenant_id: TenantId,
        /// Status before the change.
        previous: ServerStatus,
        /// Status after the change.
        current: ServerStatus,
    },

    /// A server's provisioning phase advanced.
    ProvisioningPhaseChanged {
        /// Affected server.
        server_id: ServerId,
        /// Phase after the advance.
        phase: ProvisioningPhase,
    },

    /// Every required provisioning step finished.
    ProvisioningCompleted {
        /// Affected server.
        server_id: ServerId,
        /// Owning tenant.
        tenant_id: TenantId,
    },

    /// A required provisioning step failed; the phase is stalled awaiting an
    /// operator. Published once per stall, not per heartbeat.
    ProvisioningStalled {
        /// Affected server.
        server_id: ServerId,
        /// Owning tenant.
        tenant_id: TenantId,
        /// Step type that failed.
        step_type: String,
        /// Agent-reported error, verbatim.
        error: Option<String>,
    },

    /// A firewall rule needs operator confirmation before its deadline.
    FirewallConfirmationRequired {
        /// Affected rule.
        rule_id: RuleId,
        /// Affected server.
        server_id: ServerId,
        /// Owning tenant.
        tenant_id: TenantId,
        /// Rollback deadline.
        expires_at: DateTime<Utc>,
    },

    /// An unconfirmed firewall rule was rolled back by the sweep.
    FirewallRuleRolledBack {
        /// Affected rule.
        rule_id: RuleId,
        /// Affected server.
        server_id: ServerId,
        /// Owning tenant.
        tenant_id: TenantId,
        /// Recorded rollback reason.
        reason: String,
    },

    /// A remote command failed.
    JobFailed {
        /// Failed job.
        job_id: JobId,
        /// Target server.
        server_id: ServerId,
        /// Job type tag.
        job_type: String,
        /// Agent-reported error, verbatim.
        error: Option<String>,
    },
}
