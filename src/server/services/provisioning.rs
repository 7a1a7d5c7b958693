//! Catalog-driven provisioning state machine.
//!
//! On first contact the machine fans the applicable catalog out into
//! provisioning steps and one job per step, then tracks step outcomes
//! through the job queue's completion dispatch. Required failures stall
//! the phase for operator intervention; the phase never regresses.

use crate::events::{DomainEvent, EventPublisher};
use crate::job::domain::{Job, JobStatus};
use crate::job::ports::JobRepository;
use crate::job::services::{
    CompletionHandler, CompletionHandlerError, EnqueueJobRequest, HandlerRegistry,
    HandlerRegistryError, JobQueueError, JobQueueService,
};
use crate::server::domain::{
    ProvisioningPhase, ProvisioningStep, Server, ServerDomainError, ServerId, Service,
    ServiceStatus, StepStatus, catalog,
};
use crate::server::ports::{
    ProvisioningStepRepository, ServerRepository, ServerRepositoryError, ServiceRepository,
    ServiceRepositoryError, StepRepositoryError,
};
use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Domain transition failed.
    #[error(transparent)]
    Domain(#[from] ServerDomainError),
    /// Server persistence failed.
    #[error(transparent)]
    Servers(#[from] ServerRepositoryError),
    /// Step persistence failed.
    #[error(transparent)]
    Steps(#[from] StepRepositoryError),
    /// Service persistence failed.
    #[error(transparent)]
    Services(#[from] ServiceRepositoryError),
    /// Step job could not be enqueued.
    #[error(transparent)]
    Queue(#[from] JobQueueError),
}

/// Result type for provisioning operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Orchestrates step fan-out, outcome recording, and phase completion.
#[derive(Clone)]
pub struct ProvisioningService<S, P, V, J, C>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    servers: Arc<S>,
    steps: Arc<P>,
    services: Arc<V>,
    queue: Arc<JobQueueService<J, C>>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<C>,
}

impl<S, P, V, J, C> ProvisioningService<S, P, V, J, C>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    /// Creates the service over its repositories, queue, event sink, and
    /// clock.
    #[must_use]
    pub fn new(
        servers: Arc<S>,
        steps: Arc<P>,
        services: Arc<V>,
        queue: Arc<JobQueueService<J, C>>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            servers,
            steps,
            services,
            queue,
            events,
            clock,
        }
    }

    /// Fans the applicable catalog out into steps and jobs, then moves the
    /// server to `installing`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError`] when step persistence, job
    /// enqueueing, or the phase advance fails.
    pub async fn begin_bootstrap(
        &self,
        server: &mut Server,
    ) -> ProvisioningResult<Vec<ProvisioningStep>> {
        let now = self.clock.utc();
        let mut steps = catalog::steps_for_server(server.id(), server.stack(), now);
        self.steps.insert_batch(&steps).await?;

        for step in &mut steps {
            let job = self
                .queue
                .enqueue(EnqueueJobRequest::new(
                    server.id(),
                    server.tenant_id(),
                    step.step_type(),
                    json!({
                        "step_id": step.id(),
                        "step_type": step.step_type(),
                    }),
                ))
                .await?;
            step.mark_queued(job.id())?;
            self.steps.update(step).await?;
        }

        server.advance_phase(ProvisioningPhase::Installing)?;
        self.events.publish(DomainEvent::ProvisioningPhaseChanged {
            server_id: server.id(),
            phase: ProvisioningPhase::Installing,
        });
        info!(
            server_id = %server.id(),
            steps = steps.len(),
            "provisioning steps fanned out"
        );
        Ok(steps)
    }

    /// Re-reads the server's steps and completes the phase when every
    /// required step is satisfied. Returns whether the phase completed.
    ///
    /// Completion triggers the one-time service resync from the last
    /// heartbeat and publishes [`DomainEvent::ProvisioningCompleted`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError`] when persistence or the phase advance
    /// fails.
    pub async fn check_completion(&self, server: &mut Server) -> ProvisioningResult<bool> {
        if server.phase() != ProvisioningPhase::Installing {
            return Ok(false);
        }
        let steps = self.steps.list_for_server(server.id()).await?;
        let all_required_satisfied = steps
            .iter()
            .filter(|step| step.is_required())
            .all(ProvisioningStep::is_satisfied);
        if steps.is_empty() || !all_required_satisfied {
            return Ok(false);
        }

        server.advance_phase(ProvisioningPhase::Completed)?;
        self.resync_services(server).await?;
        self.events.publish(DomainEvent::ProvisioningPhaseChanged {
            server_id: server.id(),
            phase: ProvisioningPhase::Completed,
        });
        self.events.publish(DomainEvent::ProvisioningCompleted {
            server_id: server.id(),
            tenant_id: server.tenant_id(),
        });
        info!(server_id = %server.id(), "provisioning completed");
        Ok(true)
    }

    /// Reconciles installed-service records from the server's observed
    /// status map.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Services`] when persistence fails.
    pub async fn resync_services(&self, server: &Server) -> ProvisioningResult<()> {
        let now = self.clock.utc();
        for (name, observed) in server.services_status() {
            let status = observed_service_status(observed);
            if let Some(mut existing) = self.services.find_by_name(server.id(), name).await? {
                match status {
                    ServiceStatus::Failed => existing.mark_failed(None, now),
                    _ => existing.mark_active(None, now),
                }
                self.services.update(&existing).await?;
            } else {
                let service = Service::new(server.id(), name.clone(), status, now);
                self.services.insert(&service).await?;
            }
        }
        Ok(())
    }

    /// Records a step job's terminal outcome and runs the completion
    /// check.
    ///
    /// Required-step failures stall the phase and publish
    /// [`DomainEvent::ProvisioningStalled`] exactly once; the queue never
    /// re-dispatches a duplicate completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError`] when persistence or a state
    /// transition fails.
    pub async fn record_step_outcome(&self, job: &Job) -> ProvisioningResult<()> {
        let Some(mut step) = self.steps.find_by_job(job.id()).await? else {
            warn!(job_id = %job.id(), job_type = job.job_type(), "no step linked to job");
            return Ok(());
        };
        let now = self.clock.utc();
        if step.status() == StepStatus::Queued {
            step.start(job.started_at().unwrap_or(now))?;
        }

        if job.status() == JobStatus::Completed {
            step.complete(job.output().map(ToOwned::to_owned), now)?;
        } else {
            step.fail(job.error().map(ToOwned::to_owned), now)?;
        }
        self.steps.update(&step).await?;

        let Some(mut server) = self.servers.find_by_id(step.server_id()).await? else {
            warn!(server_id = %step.server_id(), "step outcome for unknown server");
            return Ok(());
        };

        if step.status() == StepStatus::Failed {
            self.events.publish(DomainEvent::JobFailed {
                job_id: job.id(),
                server_id: server.id(),
                job_type: job.job_type().to_owned(),
                error: job.error().map(ToOwned::to_owned),
            });
            if step.is_required() {
                warn!(
                    server_id = %server.id(),
                    step_type = step.step_type(),
                    "required provisioning step failed, phase stalled"
                );
                self.events.publish(DomainEvent::ProvisioningStalled {
                    server_id: server.id(),
                    tenant_id: server.tenant_id(),
                    step_type: step.step_type().to_owned(),
                    error: step.error().map(ToOwned::to_owned),
                });
            }
        } else if let Some(name) = installed_service_name(step.step_type()) {
            self.upsert_installed_service(server.id(), name).await?;
        }

        if self.check_completion(&mut server).await? {
            self.servers.update(&server).await?;
        }
        Ok(())
    }

    async fn upsert_installed_service(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> ProvisioningResult<()> {
        let now = self.clock.utc();
        if let Some(mut existing) = self.services.find_by_name(server_id, name).await? {
            existing.mark_active(None, now);
            self.services.update(&existing).await?;
        } else {
            let service = Service::new(server_id, name, ServiceStatus::Active, now);
            self.services.insert(&service).await?;
        }
        Ok(())
    }
}

/// Maps an agent-observed status string onto a service record status.
fn observed_service_status(observed: &str) -> ServiceStatus {
    match observed.trim().to_ascii_lowercase().as_str() {
        "failed" | "stopped" | "dead" | "error" => ServiceStatus::Failed,
        "installing" => ServiceStatus::Installing,
        _ => ServiceStatus::Active,
    }
}

/// Returns the installed-service name a provisioning step maintains, if
/// any. Steps like `system_update` install nothing trackable.
fn installed_service_name(step_type: &str) -> Option<&str> {
    step_type
        .strip_prefix("provision_")
        .filter(|name| *name != "firewall")
}

/// Completion handler shared by every catalog step type.
pub struct StepCompletionHandler<S, P, V, J, C>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    provisioning: Arc<ProvisioningService<S, P, V, J, C>>,
}

impl<S, P, V, J, C> StepCompletionHandler<S, P, V, J, C>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    /// Creates the handler over the provisioning service.
    #[must_use]
    pub const fn new(provisioning: Arc<ProvisioningService<S, P, V, J, C>>) -> Self {
        Self { provisioning }
    }
}

#[async_trait]
impl<S, P, V, J, C> CompletionHandler for StepCompletionHandler<S, P, V, J, C>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    async fn on_complete(&self, job: &Job) -> Result<(), CompletionHandlerError> {
        self.provisioning
            .record_step_outcome(job)
            .await
            .map_err(CompletionHandlerError::new)
    }
}

/// Registers one shared step handler for every catalog step type.
///
/// # Errors
///
/// Returns [`HandlerRegistryError::DuplicateType`] when a catalog type is
/// already registered; always a wiring bug.
pub fn register_step_handlers<S, P, V, J, C>(
    registry: &mut HandlerRegistry,
    provisioning: &Arc<ProvisioningService<S, P, V, J, C>>,
) -> Result<(), HandlerRegistryError>
where
    S: ServerRepository + 'static,
    P: ProvisioningStepRepository + 'static,
    V: ServiceRepository + 'static,
    J: JobRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let handler: Arc<dyn CompletionHandler> =
        Arc::new(StepCompletionHandler::new(Arc::clone(provisioning)));
    for entry in catalog::STANDARD_CATALOG {
        registry.register(entry.step_type, Arc::clone(&handler))?;
    }
    Ok(())
}
