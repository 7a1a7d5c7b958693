//! Completion handlers for server-scoped job types outside the catalog.

use crate::job::domain::{Job, JobStatus};
use crate::job::services::{CompletionHandler, CompletionHandlerError};
use crate::server::domain::{Service, ServiceStatus};
use crate::server::ports::ServiceRepository;
use async_trait::async_trait;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Job type executed by the agent to install a single service on demand.
pub const SERVICE_INSTALL_JOB_TYPE: &str = "service_install";

/// Payload contract for `service_install` jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstallPayload {
    /// Service name to install.
    pub service: String,
    /// Version constraint, if any.
    pub version: Option<String>,
}

/// Completion handler for `service_install`: marks the service installed
/// or records its error.
pub struct ServiceInstallHandler<V, C>
where
    V: ServiceRepository,
    C: Clock + Send + Sync,
{
    services: Arc<V>,
    clock: Arc<C>,
}

impl<V, C> ServiceInstallHandler<V, C>
where
    V: ServiceRepository,
    C: Clock + Send + Sync,
{
    /// Creates the handler over the service repository.
    #[must_use]
    pub const fn new(services: Arc<V>, clock: Arc<C>) -> Self {
        Self { services, clock }
    }
}

#[async_trait]
impl<V, C> CompletionHandler for ServiceInstallHandler<V, C>
where
    V: ServiceRepository,
    C: Clock + Send + Sync,
{
    async fn on_complete(&self, job: &Job) -> Result<(), CompletionHandlerError> {
        let payload: ServiceInstallPayload =
            serde_json::from_value(job.payload().clone()).map_err(CompletionHandlerError::new)?;
        let now = self.clock.utc();
        let succeeded = job.status() == JobStatus::Completed;

        let existing = self
            .services
            .find_by_name(job.server_id(), &payload.service)
            .await
            .map_err(CompletionHandlerError::new)?;
        if let Some(mut service) = existing {
            if succeeded {
                service.mark_active(payload.version, now);
            } else {
                service.mark_failed(job.error().map(ToOwned::to_owned), now);
            }
            self.services
                .update(&service)
                .await
                .map_err(CompletionHandlerError::new)?;
        } else {
            let mut service = Service::new(
                job.server_id(),
                payload.service.clone(),
                ServiceStatus::Installing,
                now,
            );
            if succeeded {
                service.mark_active(payload.version, now);
            } else {
                service.mark_failed(job.error().map(ToOwned::to_owned), now);
            }
            self.services
                .insert(&service)
                .await
                .map_err(CompletionHandlerError::new)?;
        }

        if succeeded {
            info!(server_id = %job.server_id(), service = %payload.service, "service installed");
        } else {
            warn!(
                server_id = %job.server_id(),
                service = %payload.service,
                error = job.error(),
                "service install failed"
            );
        }
        Ok(())
    }
}
