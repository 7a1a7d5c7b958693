//! In-memory installed-service repository.

use crate::server::domain::{ServerId, Service, ServiceId};
use crate::server::ports::{ServiceRepository, ServiceRepositoryError, ServiceRepositoryResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory service repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceRepository {
    state: Arc<RwLock<HashMap<ServiceId, Service>>>,
}

impl InMemoryServiceRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> ServiceRepositoryError {
    ServiceRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ServiceRepository for InMemoryServiceRepository {
    async fn insert(&self, service: &Service) -> ServiceRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        state.insert(service.id(), service.clone());
        Ok(())
    }

    async fn update(&self, service: &Service) -> ServiceRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&service.id()) {
            return Err(ServiceRepositoryError::NotFound(service.id()));
        }
        state.insert(service.id(), service.clone());
        Ok(())
    }

    async fn find_by_name(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> ServiceRepositoryResult<Option<Service>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state
            .values()
            .find(|service| service.server_id() == server_id && service.name() == name)
            .cloned())
    }

    async fn list_for_server(&self, server_id: ServerId) -> ServiceRepositoryResult<Vec<Service>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut services: Vec<Service> = state
            .values()
            .filter(|service| service.server_id() == server_id)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(services)
    }
}
