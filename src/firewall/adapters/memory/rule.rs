//! In-memory firewall rule repository for tests and reference semantics.

use crate::firewall::domain::{FirewallRule, RuleId};
use crate::firewall::ports::{
    FirewallRepositoryError, FirewallRepositoryResult, FirewallRuleRepository,
};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory firewall rule repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFirewallRuleRepository {
    state: Arc<RwLock<HashMap<RuleId, FirewallRule>>>,
}

impl InMemoryFirewallRuleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> FirewallRepositoryError {
    FirewallRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl FirewallRuleRepository for InMemoryFirewallRuleRepository {
    async fn insert(&self, rule: &FirewallRule) -> FirewallRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.contains_key(&rule.id()) {
            return Err(FirewallRepositoryError::DuplicateRule(rule.id()));
        }
        state.insert(rule.id(), rule.clone());
        Ok(())
    }

    async fn update(&self, rule: &FirewallRule) -> FirewallRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&rule.id()) {
            return Err(FirewallRepositoryError::NotFound(rule.id()));
        }
        state.insert(rule.id(), rule.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: RuleId) -> FirewallRepositoryResult<Option<FirewallRule>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.get(&id).cloned())
    }

    async fn find_pending_by_token_digest(
        &self,
        token_digest: &str,
    ) -> FirewallRepositoryResult<Option<FirewallRule>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state
            .values()
            .find(|rule| {
                rule.is_pending_confirmation()
                    && rule.confirmation_token_digest() == Some(token_digest)
            })
            .cloned())
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> FirewallRepositoryResult<Vec<FirewallRule>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut rules: Vec<FirewallRule> = state
            .values()
            .filter(|rule| rule.is_confirmation_expired(now))
            .cloned()
            .collect();
        rules.sort_by_key(FirewallRule::created_at);
        Ok(rules)
    }

    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> FirewallRepositoryResult<Vec<FirewallRule>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut rules: Vec<FirewallRule> = state
            .values()
            .filter(|rule| rule.server_id() == server_id)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| (rule.rule_order(), rule.created_at()));
        Ok(rules)
    }
}
