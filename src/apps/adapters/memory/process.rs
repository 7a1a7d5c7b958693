//! In-memory process repository for tests and reference semantics.
//!
//! The single write lock is the serialization point for port reservation:
//! a conflicting insert observes every earlier reservation.

use crate::apps::domain::{AppId, AppProcess, ProcessId};
use crate::apps::ports::{ProcessRepository, ProcessRepositoryError, ProcessRepositoryResult};
use crate::netpool::ports::{PortUsageError, PortUsageSource};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory process repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessRepository {
    state: Arc<RwLock<HashMap<ProcessId, AppProcess>>>,
}

impl InMemoryProcessRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> ProcessRepositoryError {
    ProcessRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl PortUsageSource for InMemoryProcessRepository {
    async fn used_ports(&self, server_id: ServerId) -> Result<BTreeSet<u16>, PortUsageError> {
        let state = self
            .state
            .read()
            .map_err(|err| PortUsageError::new(std::io::Error::other(err.to_string())))?;
        Ok(state
            .values()
            .filter(|process| process.server_id() == server_id)
            .filter_map(AppProcess::port)
            .collect())
    }
}

#[async_trait]
impl ProcessRepository for InMemoryProcessRepository {
    async fn insert(&self, process: &AppProcess) -> ProcessRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.contains_key(&process.id()) {
            return Err(ProcessRepositoryError::DuplicateProcess(process.id()));
        }
        if let Some(port) = process.port() {
            let taken = state.values().any(|existing| {
                existing.server_id() == process.server_id() && existing.port() == Some(port)
            });
            if taken {
                return Err(ProcessRepositoryError::PortInUse {
                    server_id: process.server_id(),
                    port,
                });
            }
        }
        state.insert(process.id(), process.clone());
        Ok(())
    }

    async fn update(&self, process: &AppProcess) -> ProcessRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&process.id()) {
            return Err(ProcessRepositoryError::NotFound(process.id()));
        }
        state.insert(process.id(), process.clone());
        Ok(())
    }

    async fn delete(&self, id: ProcessId) -> ProcessRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.remove(&id).is_none() {
            return Err(ProcessRepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: ProcessId) -> ProcessRepositoryResult<Option<AppProcess>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.get(&id).cloned())
    }

    async fn find_by_app(&self, app_id: AppId) -> ProcessRepositoryResult<Vec<AppProcess>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut processes: Vec<AppProcess> = state
            .values()
            .filter(|process| process.app_id() == Some(app_id))
            .cloned()
            .collect();
        processes.sort_by_key(AppProcess::created_at);
        Ok(processes)
    }

    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> ProcessRepositoryResult<Vec<AppProcess>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut processes: Vec<AppProcess> = state
            .values()
            .filter(|process| process.server_id() == server_id)
            .cloned()
            .collect();
        processes.sort_by_key(AppProcess::created_at);
        Ok(processes)
    }
}
