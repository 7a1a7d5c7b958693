//! Heartbeat ingestion and state reconciliation.
//!
//! Every agent report refreshes observed state, drives the provisioning
//! machine on first contact, and backstops the phase completion check.
//! The bootstrap branch always wins over heartbeat service sync: recording
//! manually installed services before the canonical steps run would race
//! the catalog.

use super::provisioning::{ProvisioningError, ProvisioningService};
use crate::events::{DomainEvent, EventPublisher};
use crate::job::ports::JobRepository;
use crate::server::domain::{
    HeartbeatReport, ProvisioningPhase, Server, ServerId,
};
use crate::server::ports::{
    MetricsRecorder, ProvisioningStepRepository, ServerRepository, ServerRepositoryError,
    ServiceRepository,
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Service-level errors for heartbeat ingestion.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The reporting server does not exist.
    #[error("unknown server: {0}")]
    UnknownServer(ServerId),
    /// Server persistence failed.
    #[error(transparent)]
    Servers(#[from] ServerRepositoryError),
    /// Provisioning machinery failed.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
}

/// Result type for heartbeat ingestion.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Ingests periodic agent reports and reconciles server state.
#[derive(Clone)]
pub struct HeartbeatReconciler<S, P, V, J, C, M>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
{
    servers: Arc<S>,
    provisioning: Arc<ProvisioningService<S, P, V, J, C>>,
    metrics: Arc<M>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<C>,
}

impl<S, P, V, J, C, M> HeartbeatReconciler<S, P, V, J, C, M>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
{
    /// Creates the reconciler over its collaborators.
    #[must_use]
    pub fn new(
        servers: Arc<S>,
        provisioning: Arc<ProvisioningService<S, P, V, J, C>>,
        metrics: Arc<M>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            servers,
            provisioning,
            metrics,
            events,
            clock,
        }
    }

    /// Ingests one periodic report from a server's agent.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::UnknownServer`] when the server does not
    /// exist, or other [`ReconcileError`] variants when persistence or the
    /// provisioning machine fails.
    pub async fn ingest(
        &self,
        server_id: ServerId,
        report: &HeartbeatReport,
    ) -> ReconcileResult<Server> {
        let mut server = self
            .servers
            .find_by_id(server_id)
            .await?
            .ok_or(ReconcileError::UnknownServer(server_id))?;

        let now = self.clock.utc();
        let first_contact = server.is_awaiting_first_contact();
        let entered_bootstrap = server.phase() == ProvisioningPhase::Bootstrap;
        let previous = server.record_heartbeat(now);

        if let Some(specs) = report.specs.clone() {
            server.observe_specs(specs, now);
        }
        if report.has_service_statuses() {
            server.observe_services(
                report
                    .services_status
                    .iter()
                    .map(|observation| (observation.name.clone(), observation.status.clone())),
                now,
            );
        }
        if !report.daemons_status.is_empty() {
            server.observe_daemons(
                report
                    .daemons_status
                    .iter()
                    .map(|observation| (observation.name.clone(), observation.running)),
                now,
            );
        }
        if !report.tools_status.is_empty() {
            // Tools report a version when the agent can read one; the raw
            // status string stands in otherwise.
            server.observe_tools(
                report.tools_status.iter().map(|observation| {
                    (
                        observation.name.clone(),
                        observation
                            .version
                            .clone()
                            .unwrap_or_else(|| observation.status.clone()),
                    )
                }),
                now,
            );
        }
        if let Some(health) = report.database_health.as_deref() {
            server.observe_database_health(health, now);
        }

        if first_contact && entered_bootstrap {
            // Bootstrap wins over service sync even when the report already
            // carries service statuses.
            self.provisioning.begin_bootstrap(&mut server).await?;
        } else {
            if first_contact && report.has_service_statuses() {
                // Legacy server without provisioning phases: reconcile
                // installed services straight from the report.
                self.provisioning.resync_services(&server).await?;
            }
            self.provisioning.check_completion(&mut server).await?;
        }

        self.servers.update(&server).await?;

        if previous != server.status() {
            self.events.publish(DomainEvent::ServerStatusChanged {
                server_id: server.id(),
                tenant_id: server.tenant_id(),
                previous,
                current: server.status(),
            });
        }

        if !report.resources.is_empty()
            && let Err(err) = self.metrics.append(server.id(), &report.resources, now).await
        {
            warn!(server_id = %server.id(), error = %err, "failed to append metric sample");
        }

        debug!(server_id = %server.id(), status = %server.status(), "heartbeat ingested");
        Ok(server)
    }
}
