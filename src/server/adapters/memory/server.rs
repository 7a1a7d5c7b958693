//! In-memory server repository for tests and reference semantics.

use crate::server::domain::{Server, ServerId};
use crate::server::ports::{ServerRepository, ServerRepositoryError, ServerRepositoryResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory server repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerRepository {
    state: Arc<RwLock<HashMap<ServerId, Server>>>,
}

impl InMemoryServerRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> ServerRepositoryError {
    ServerRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ServerRepository for InMemoryServerRepository {
    async fn insert(&self, server: &Server) -> ServerRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.contains_key(&server.id()) {
            return Err(ServerRepositoryError::DuplicateServer(server.id()));
        }
        state.insert(server.id(), server.clone());
        Ok(())
    }

    async fn update(&self, server: &Server) -> ServerRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&server.id()) {
            return Err(ServerRepositoryError::NotFound(server.id()));
        }
        state.insert(server.id(), server.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ServerId) -> ServerRepositoryResult<Option<Server>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.get(&id).cloned())
    }

    async fn find_by_provision_token_digest(
        &self,
        digest: &str,
    ) -> ServerRepositoryResult<Option<Server>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state
            .values()
            .find(|server| server.provision_token_digest() == Some(digest))
            .cloned())
    }

    async fn find_by_agent_token_digest(
        &self,
        digest: &str,
    ) -> ServerRepositoryResult<Option<Server>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state
            .values()
            .find(|server| server.agent_token_digest() == Some(digest))
            .cloned())
    }
}
