//! Repository port for firewall rule persistence.

use crate::firewall::domain::{FirewallRule, RuleId};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for firewall repository operations.
pub type FirewallRepositoryResult<T> = Result<T, FirewallRepositoryError>;

/// Firewall rule persistence contract.
#[async_trait]
pub trait FirewallRuleRepository: Send + Sync {
    /// Stores a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallRepositoryError::DuplicateRule`] when the
    /// identifier already exists.
    async fn insert(&self, rule: &FirewallRule) -> FirewallRepositoryResult<()>;

    /// Persists changes to an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallRepositoryError::NotFound`] when the rule does not
    /// exist.
    async fn update(&self, rule: &FirewallRule) -> FirewallRepositoryResult<()>;

    /// Finds a rule by identifier.
    async fn find_by_id(&self, id: RuleId) -> FirewallRepositoryResult<Option<FirewallRule>>;

    /// Finds the rule whose outstanding confirmation token matches the
    /// digest. Resolved and rolled-back rules never match.
    async fn find_pending_by_token_digest(
        &self,
        token_digest: &str,
    ) -> FirewallRepositoryResult<Option<FirewallRule>>;

    /// Returns every rule whose confirmation window lapsed before `now`.
    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> FirewallRepositoryResult<Vec<FirewallRule>>;

    /// Returns all rules for a server in evaluation order.
    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> FirewallRepositoryResult<Vec<FirewallRule>>;
}

/// Errors returned by firewall repository implementations.
#[derive(Debug, Clone, Error)]
pub enum FirewallRepositoryError {
    /// A rule with the same identifier already exists.
    #[error("duplicate rule identifier: {0}")]
    DuplicateRule(RuleId),

    /// The rule was not found.
    #[error("rule not found: {0}")]
    NotFound(RuleId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl FirewallRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
