//! Repository ports for apps and supervised processes.

use crate::apps::domain::{AppId, AppProcess, ProcessId, WebApp};
use crate::netpool::ports::PortUsageSource;
use crate::server::domain::ServerId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for web app repository operations.
pub type WebAppRepositoryResult<T> = Result<T, WebAppRepositoryError>;

/// Web app persistence contract.
#[async_trait]
pub trait WebAppRepository: Send + Sync {
    /// Stores a new app.
    ///
    /// # Errors
    ///
    /// Returns [`WebAppRepositoryError::DuplicateApp`] when the identifier
    /// already exists and [`WebAppRepositoryError::DuplicateDomain`] when
    /// the domain is already hosted on the server.
    async fn insert(&self, app: &WebApp) -> WebAppRepositoryResult<()>;

    /// Persists changes to an existing app.
    ///
    /// # Errors
    ///
    /// Returns [`WebAppRepositoryError::NotFound`] when the app does not
    /// exist.
    async fn update(&self, app: &WebApp) -> WebAppRepositoryResult<()>;

    /// Finds an app by identifier.
    async fn find_by_id(&self, id: AppId) -> WebAppRepositoryResult<Option<WebApp>>;

    /// Returns all apps hosted on a server, oldest first.
    async fn list_for_server(&self, server_id: ServerId) -> WebAppRepositoryResult<Vec<WebApp>>;
}

/// Errors returned by web app repository implementations.
#[derive(Debug, Clone, Error)]
pub enum WebAppRepositoryError {
    /// An app with the same identifier already exists.
    #[error("duplicate app identifier: {0}")]
    DuplicateApp(AppId),

    /// The server already hosts an app for this domain.
    #[error("domain '{domain}' is already hosted on server {server_id}")]
    DuplicateDomain {
        /// Hosting server.
        server_id: ServerId,
        /// Conflicting site domain.
        domain: String,
    },

    /// The app was not found.
    #[error("app not found: {0}")]
    NotFound(AppId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WebAppRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

/// Result type for process repository operations.
pub type ProcessRepositoryResult<T> = Result<T, ProcessRepositoryError>;

/// Supervised-process persistence contract.
///
/// Implementations are the serialization point for port reservation:
/// `insert` must reject a row whose port is already held by a live row on
/// the same server, atomically with respect to concurrent inserts. They
/// also serve as the live [`PortUsageSource`] the allocator reads.
#[async_trait]
pub trait ProcessRepository: PortUsageSource {
    /// Stores a new process, reserving its port.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessRepositoryError::PortInUse`] when the port is
    /// already held on the server and
    /// [`ProcessRepositoryError::DuplicateProcess`] when the identifier
    /// already exists.
    async fn insert(&self, process: &AppProcess) -> ProcessRepositoryResult<()>;

    /// Persists changes to an existing process.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessRepositoryError::NotFound`] when the process does
    /// not exist.
    async fn update(&self, process: &AppProcess) -> ProcessRepositoryResult<()>;

    /// Hard-deletes a process, releasing any port it held.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessRepositoryError::NotFound`] when the process does
    /// not exist.
    async fn delete(&self, id: ProcessId) -> ProcessRepositoryResult<()>;

    /// Finds a process by identifier.
    async fn find_by_id(&self, id: ProcessId) -> ProcessRepositoryResult<Option<AppProcess>>;

    /// Returns the processes owned by an app, oldest first.
    async fn find_by_app(&self, app_id: AppId) -> ProcessRepositoryResult<Vec<AppProcess>>;

    /// Returns all processes on a server, oldest first.
    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> ProcessRepositoryResult<Vec<AppProcess>>;
}

/// Errors returned by process repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ProcessRepositoryError {
    /// A process with the same identifier already exists.
    #[error("duplicate process identifier: {0}")]
    DuplicateProcess(ProcessId),

    /// Another live process on the server already holds the port.
    #[error("port {port} is already in use on server {server_id}")]
    PortInUse {
        /// Hosting server.
        server_id: ServerId,
        /// Contested port.
        port: u16,
    },

    /// The process was not found.
    #[error("process not found: {0}")]
    NotFound(ProcessId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProcessRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
