//! Firewall safety net: apply with a confirmation window, confirm, and the
//! periodic rollback sweep.

use crate::events::{DomainEvent, EventPublisher};
use crate::firewall::domain::{
    Direction, FirewallDomainError, FirewallRule, PortSpec, RuleAction, RuleProtocol, RuleSource,
};
use crate::firewall::ports::{FirewallRepositoryError, FirewallRuleRepository};
use crate::job::ports::JobRepository;
use crate::job::services::{EnqueueJobRequest, JobQueueError, JobQueueService};
use crate::server::domain::{ServerId, TenantId, token};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Default confirmation window for self-locking rules.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: i64 = 300;

/// Job type dispatched to agents to apply a rule.
pub const APPLY_JOB_TYPE: &str = "firewall_apply";

/// Job type dispatched to agents to revert a rolled-back rule.
pub const REVERT_JOB_TYPE: &str = "firewall_revert";

/// Reason recorded on rules the sweep reverts.
const EXPIRY_ROLLBACK_REASON: &str = "confirmation window expired without operator confirmation";

/// Request payload for applying a firewall rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRuleRequest {
    server_id: ServerId,
    tenant_id: TenantId,
    direction: Direction,
    action: RuleAction,
    protocol: RuleProtocol,
    port_spec: PortSpec,
    source: RuleSource,
    rule_order: i16,
}

impl ApplyRuleRequest {
    /// Creates a request defaulting to any protocol, any port, any source.
    #[must_use]
    pub const fn new(
        server_id: ServerId,
        tenant_id: TenantId,
        direction: Direction,
        action: RuleAction,
    ) -> Self {
        Self {
            server_id,
            tenant_id,
            direction,
            action,
            protocol: RuleProtocol::Any,
            port_spec: PortSpec::Any,
            source: RuleSource::Any,
            rule_order: 0,
        }
    }

    /// Sets the transport protocol.
    #[must_use]
    pub const fn with_protocol(mut self, protocol: RuleProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the port specification.
    #[must_use]
    pub const fn with_port_spec(mut self, port_spec: PortSpec) -> Self {
        self.port_spec = port_spec;
        self
    }

    /// Sets the source specification.
    #[must_use]
    pub fn with_source(mut self, source: RuleSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the evaluation order.
    #[must_use]
    pub const fn with_order(mut self, rule_order: i16) -> Self {
        self.rule_order = rule_order;
        self
    }
}

/// Confirmation details returned when a rule needs operator confirmation.
///
/// The plaintext token appears here exactly once; only its digest is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTicket {
    /// One-time confirmation token for the confirm endpoint.
    pub token: String,
    /// Deadline after which the sweep reverts the rule.
    pub expires_at: DateTime<Utc>,
    /// Window length in seconds, for operator messaging.
    pub timeout_secs: i64,
}

/// Result of applying a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRule {
    /// The stored, already-active rule.
    pub rule: FirewallRule,
    /// Present when the rule entered the confirmation window.
    pub confirmation: Option<ConfirmationTicket>,
}

/// Service-level errors for firewall operations.
#[derive(Debug, Error)]
pub enum FirewallError {
    /// Domain transition failed.
    #[error(transparent)]
    Domain(#[from] FirewallDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] FirewallRepositoryError),
    /// Enqueueing the apply/revert job failed.
    #[error(transparent)]
    Queue(#[from] JobQueueError),
}

/// Result type for firewall service operations.
pub type FirewallResult<T> = Result<T, FirewallError>;

/// Confirm-or-rollback orchestration over firewall rules.
#[derive(Clone)]
pub struct FirewallSafetyService<F, J, C>
where
    F: FirewallRuleRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    rules: Arc<F>,
    queue: Arc<JobQueueService<J, C>>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<C>,
    confirmation_timeout: Duration,
}

impl<F, J, C> FirewallSafetyService<F, J, C>
where
    F: FirewallRuleRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    /// Creates a safety service with the default confirmation window.
    #[must_use]
    pub fn new(
        rules: Arc<F>,
        queue: Arc<JobQueueService<J, C>>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<C>,
    ) -> Self {
        Self::with_timeout(
            rules,
            queue,
            events,
            clock,
            Duration::seconds(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
        )
    }

    /// Creates a safety service with an explicit confirmation window.
    #[must_use]
    pub const fn with_timeout(
        rules: Arc<F>,
        queue: Arc<JobQueueService<J, C>>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<C>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            rules,
            queue,
            events,
            clock,
            confirmation_timeout,
        }
    }

    /// Applies a rule: persists it active, opens a confirmation window when
    /// the rule could sever the operator's own access, and always enqueues
    /// the apply job.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallError::Repository`] or [`FirewallError::Queue`]
    /// when persistence or job enqueue fails.
    pub async fn apply(&self, request: ApplyRuleRequest) -> FirewallResult<AppliedRule> {
        let now = self.clock.utc();
        let mut rule = FirewallRule::new(
            request.server_id,
            request.tenant_id,
            request.direction,
            request.action,
            request.protocol,
            request.port_spec,
            request.source,
            request.rule_order,
            now,
        );

        let confirmation = if rule.requires_confirmation() {
            let secret = token::GeneratedSecret::generate();
            let expires_at = now + self.confirmation_timeout;
            rule.mark_pending_confirmation(secret.digest(), expires_at, now);
            Some(ConfirmationTicket {
                token: secret.plaintext().to_owned(),
                expires_at,
                timeout_secs: self.confirmation_timeout.num_seconds(),
            })
        } else {
            None
        };

        self.rules.insert(&rule).await?;
        self.enqueue_rule_job(&rule, APPLY_JOB_TYPE).await?;

        if let Some(ticket) = &confirmation {
            info!(
                rule_id = %rule.id(),
                server_id = %rule.server_id(),
                expires_at = %ticket.expires_at,
                "firewall rule pending confirmation"
            );
            self.events.publish(DomainEvent::FirewallConfirmationRequired {
                rule_id: rule.id(),
                server_id: rule.server_id(),
                tenant_id: rule.tenant_id(),
                expires_at: ticket.expires_at,
            });
        }

        Ok(AppliedRule { rule, confirmation })
    }

    /// Resolves an outstanding confirmation by token.
    ///
    /// Returns `None` for unknown, already-resolved, or expired tokens;
    /// expired rules are left for the sweep so rollback happens exactly
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallError::Repository`] when persistence fails.
    pub async fn confirm(&self, presented_token: &str) -> FirewallResult<Option<FirewallRule>> {
        let digest = token::hash_secret(presented_token);
        let Some(mut rule) = self.rules.find_pending_by_token_digest(&digest).await? else {
            return Ok(None);
        };
        let now = self.clock.utc();
        if rule.is_confirmation_expired(now) {
            return Ok(None);
        }
        rule.confirm(now)?;
        self.rules.update(&rule).await?;
        info!(rule_id = %rule.id(), server_id = %rule.server_id(), "firewall rule confirmed");
        Ok(Some(rule))
    }

    /// Rolls back every rule whose confirmation window lapsed: deactivates
    /// it, records the reason, enqueues a revert job, and notifies the
    /// tenant owner. Returns the rules it reverted.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallError::Repository`] when the expired-rule listing
    /// fails; per-rule failures are logged and skipped so one broken rule
    /// cannot wedge the sweep.
    pub async fn sweep(&self) -> FirewallResult<Vec<FirewallRule>> {
        let now = self.clock.utc();
        let expired = self.rules.list_expired_pending(now).await?;
        let mut rolled_back = Vec::with_capacity(expired.len());

        for mut rule in expired {
            if let Err(err) = rule.roll_back(EXPIRY_ROLLBACK_REASON, now) {
                // A concurrent sweep or confirm got there first.
                warn!(rule_id = %rule.id(), error = %err, "skipping rollback");
                continue;
            }
            if let Err(err) = self.rules.update(&rule).await {
                warn!(rule_id = %rule.id(), error = %err, "failed to persist rollback");
                continue;
            }
            if let Err(err) = self.enqueue_rule_job(&rule, REVERT_JOB_TYPE).await {
                warn!(rule_id = %rule.id(), error = %err, "failed to enqueue revert job");
            }
            self.events.publish(DomainEvent::FirewallRuleRolledBack {
                rule_id: rule.id(),
                server_id: rule.server_id(),
                tenant_id: rule.tenant_id(),
                reason: EXPIRY_ROLLBACK_REASON.to_owned(),
            });
            info!(rule_id = %rule.id(), server_id = %rule.server_id(), "firewall rule rolled back");
            rolled_back.push(rule);
        }
        Ok(rolled_back)
    }

    async fn enqueue_rule_job(&self, rule: &FirewallRule, job_type: &str) -> FirewallResult<()> {
        let payload = json!({
            "rule_id": rule.id(),
            "direction": rule.direction().as_str(),
            "action": rule.action().as_str(),
            "protocol": rule.protocol().as_str(),
            "port": rule.port_spec().canonical(),
            "source": rule.source().canonical(),
            "order": rule.rule_order(),
        });
        let request = EnqueueJobRequest::new(rule.server_id(), rule.tenant_id(), job_type, payload)
            .with_priority(1);
        self.queue.enqueue(request).await?;
        Ok(())
    }
}
