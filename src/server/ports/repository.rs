//! Repository ports for servers, provisioning steps, and services.

use crate::job::domain::JobId;
use crate::server::domain::{ProvisioningStep, Server, ServerId, Service, ServiceId, StepId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for server repository operations.
pub type ServerRepositoryResult<T> = Result<T, ServerRepositoryError>;

/// Server persistence contract.
#[async_trait]
pub trait ServerRepository: Send + Sync {
    /// Stores a new server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRepositoryError::DuplicateServer`] when the
    /// identifier already exists.
    async fn insert(&self, server: &Server) -> ServerRepositoryResult<()>;

    /// Persists changes to an existing server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRepositoryError::NotFound`] when the server does not
    /// exist.
    async fn update(&self, server: &Server) -> ServerRepositoryResult<()>;

    /// Finds a server by identifier.
    async fn find_by_id(&self, id: ServerId) -> ServerRepositoryResult<Option<Server>>;

    /// Finds the server holding an outstanding provision token with this
    /// digest. Consumed tokens never match.
    async fn find_by_provision_token_digest(
        &self,
        digest: &str,
    ) -> ServerRepositoryResult<Option<Server>>;

    /// Finds the server whose agent bearer token has this digest.
    async fn find_by_agent_token_digest(
        &self,
        digest: &str,
    ) -> ServerRepositoryResult<Option<Server>>;
}

/// Errors returned by server repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ServerRepositoryError {
    /// A server with the same identifier already exists.
    #[error("duplicate server identifier: {0}")]
    DuplicateServer(ServerId),

    /// The server was not found.
    #[error("server not found: {0}")]
    NotFound(ServerId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ServerRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

/// Result type for step repository operations.
pub type StepRepositoryResult<T> = Result<T, StepRepositoryError>;

/// Provisioning-step persistence contract.
#[async_trait]
pub trait ProvisioningStepRepository: Send + Sync {
    /// Stores a batch of freshly instantiated steps.
    ///
    /// # Errors
    ///
    /// Returns [`StepRepositoryError::Persistence`] when the batch cannot
    /// be stored.
    async fn insert_batch(&self, steps: &[ProvisioningStep]) -> StepRepositoryResult<()>;

    /// Persists changes to an existing step.
    ///
    /// # Errors
    ///
    /// Returns [`StepRepositoryError::NotFound`] when the step does not
    /// exist.
    async fn update(&self, step: &ProvisioningStep) -> StepRepositoryResult<()>;

    /// Finds a step by identifier.
    async fn find_by_id(&self, id: StepId) -> StepRepositoryResult<Option<ProvisioningStep>>;

    /// Finds the step linked to a job, if any.
    async fn find_by_job(&self, job_id: JobId) -> StepRepositoryResult<Option<ProvisioningStep>>;

    /// Returns a server's steps in catalog order.
    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> StepRepositoryResult<Vec<ProvisioningStep>>;
}

/// Errors returned by step repository implementations.
#[derive(Debug, Clone, Error)]
pub enum StepRepositoryError {
    /// The step was not found.
    #[error("provisioning step not found: {0}")]
    NotFound(StepId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StepRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

/// Result type for service repository operations.
pub type ServiceRepositoryResult<T> = Result<T, ServiceRepositoryError>;

/// Installed-service persistence contract. Services are unique per
/// (server, name).
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    /// Stores a new service record.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceRepositoryError::Persistence`] when the record
    /// cannot be stored.
    async fn insert(&self, service: &Service) -> ServiceRepositoryResult<()>;

    /// Persists changes to an existing service record.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceRepositoryError::NotFound`] when the record does
    /// not exist.
    async fn update(&self, service: &Service) -> ServiceRepositoryResult<()>;

    /// Finds a server's service record by name.
    async fn find_by_name(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> ServiceRepositoryResult<Option<Service>>;

    /// Returns a server's service records, ordered by name.
    async fn list_for_server(&self, server_id: ServerId) -> ServiceRepositoryResult<Vec<Service>>;
}

/// Errors returned by service repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ServiceRepositoryError {
    /// The service record was not found.
    #[error("service not found: {0}")]
    NotFound(ServiceId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ServiceRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
