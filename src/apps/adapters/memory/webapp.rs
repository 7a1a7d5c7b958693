//! In-memory web app repository for tests and reference semantics.

use crate::apps::domain::{AppId, WebApp, WebAppStatus};
use crate::apps::ports::{WebAppRepository, WebAppRepositoryError, WebAppRepositoryResult};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory web app repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWebAppRepository {
    state: Arc<RwLock<HashMap<AppId, WebApp>>>,
}

impl InMemoryWebAppRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> WebAppRepositoryError {
    WebAppRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl WebAppRepository for InMemoryWebAppRepository {
    async fn insert(&self, app: &WebApp) -> WebAppRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.contains_key(&app.id()) {
            return Err(WebAppRepositoryError::DuplicateApp(app.id()));
        }
        // Failed creations do not reserve the domain; retries may reuse it.
        let domain_taken = state.values().any(|existing| {
            existing.server_id() == app.server_id()
                && existing.domain() == app.domain()
                && existing.status() != WebAppStatus::Failed
        });
        if domain_taken {
            return Err(WebAppRepositoryError::DuplicateDomain {
                server_id: app.server_id(),
                domain: app.domain().to_owned(),
            });
        }
        state.insert(app.id(), app.clone());
        Ok(())
    }

    async fn update(&self, app: &WebApp) -> WebAppRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&app.id()) {
            return Err(WebAppRepositoryError::NotFound(app.id()));
        }
        state.insert(app.id(), app.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AppId) -> WebAppRepositoryResult<Option<WebApp>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.get(&id).cloned())
    }

    async fn list_for_server(&self, server_id: ServerId) -> WebAppRepositoryResult<Vec<WebApp>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut apps: Vec<WebApp> = state
            .values()
            .filter(|app| app.server_id() == server_id)
            .cloned()
            .collect();
        apps.sort_by_key(WebApp::created_at);
        Ok(apps)
    }
}
