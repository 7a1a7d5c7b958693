//! Typed agent gateway: authentication plus the five protocol operations.
//!
//! The gateway sits between the HTTP adapter and the domain services. It
//! resolves bearer tokens to servers before any state mutation, converts
//! wire types to domain types, and maps domain outcomes to protocol errors
//! the HTTP layer can turn into status codes.

use super::dto::{
    CompleteJobRequest, CompleteJobResponse, FirewallConfirmResponse, HeartbeatRequest,
    HeartbeatResponse, JobDto, JobListResponse, ProvisionCallbackRequest,
    ProvisionCallbackResponse,
};
use crate::firewall::ports::FirewallRuleRepository;
use crate::firewall::services::{FirewallError, FirewallSafetyService};
use crate::job::domain::JobId;
use crate::job::ports::{CompletionApply, JobRepository, JobRepositoryError};
use crate::job::services::{JobQueueError, JobQueueService};
use crate::server::domain::{HeartbeatReport, Server, ServerSpecs};
use crate::server::ports::{
    MetricsRecorder, ProvisioningStepRepository, ServerRepository, ServiceRepository,
};
use crate::server::services::{
    HeartbeatReconciler, ReconcileError, RegistrationError, RegistrationFacts, RegistrationService,
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Maximum number of jobs one poll may claim.
pub const FETCH_JOB_LIMIT: usize = 10;

/// Protocol-level errors, mapped to HTTP statuses by the adapter.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The bearer token resolved to no server.
    #[error("invalid or missing bearer token")]
    Unauthorized,

    /// The job does not exist or belongs to another server.
    #[error("job not found: {0}")]
    JobNotOwned(JobId),

    /// The job already carries a terminal outcome.
    #[error("job already terminal: {0}")]
    CompletionConflict(JobId),

    /// The provision or confirmation token matched nothing outstanding.
    #[error("unknown or already-resolved token")]
    UnknownToken,

    /// The completion report carried an unusable status string.
    #[error("invalid completion status: {0}")]
    InvalidCompletionStatus(String),

    /// Registration machinery failed.
    #[error(transparent)]
    Registration(RegistrationError),

    /// Heartbeat reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Queue machinery failed.
    #[error(transparent)]
    Queue(JobQueueError),

    /// Firewall machinery failed.
    #[error(transparent)]
    Firewall(#[from] FirewallError),
}

/// Result type for gateway operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Agent-facing gateway over the domain services.
#[derive(Clone)]
pub struct AgentGateway<S, P, V, J, C, M, F>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    registration: Arc<RegistrationService<S, C>>,
    reconciler: Arc<HeartbeatReconciler<S, P, V, J, C, M>>,
    queue: Arc<JobQueueService<J, C>>,
    firewall: Arc<FirewallSafetyService<F, J, C>>,
    clock: Arc<C>,
}

impl<S, P, V, J, C, M, F> AgentGateway<S, P, V, J, C, M, F>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    /// Creates the gateway over its collaborating services.
    #[must_use]
    pub fn new(
        registration: Arc<RegistrationService<S, C>>,
        reconciler: Arc<HeartbeatReconciler<S, P, V, J, C, M>>,
        queue: Arc<JobQueueService<J, C>>,
        firewall: Arc<FirewallSafetyService<F, J, C>>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            registration,
            reconciler,
            queue,
            firewall,
            clock,
        }
    }

    /// Resolves a bearer token to its server, rejecting unknown tokens
    /// before any state mutation.
    async fn authenticate(&self, bearer_token: &str) -> ProtocolResult<Server> {
        self.registration
            .authenticate_agent(bearer_token)
            .await
            .map_err(ProtocolError::Registration)?
            .ok_or(ProtocolError::Unauthorized)
    }

    /// `POST /heartbeat`: ingests one periodic agent report.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Unauthorized`] for unknown tokens and
    /// [`ProtocolError::Reconcile`] when reconciliation fails.
    pub async fn heartbeat(
        &self,
        bearer_token: &str,
        request: HeartbeatRequest,
    ) -> ProtocolResult<HeartbeatResponse> {
        let server = self.authenticate(bearer_token).await?;
        let report = HeartbeatReport::from(request);
        let server = self.reconciler.ingest(server.id(), &report).await?;
        Ok(HeartbeatResponse {
            status: "ok".to_owned(),
            server_id: server.id(),
            time: self.clock.utc(),
        })
    }

    /// `GET /jobs`: atomically claims up to [`FETCH_JOB_LIMIT`] jobs for
    /// the authenticated server.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Unauthorized`] for unknown tokens and
    /// [`ProtocolError::Queue`] when the claim fails.
    pub async fn fetch_jobs(&self, bearer_token: &str) -> ProtocolResult<JobListResponse> {
        let server = self.authenticate(bearer_token).await?;
        let jobs = self
            .queue
            .fetch(server.id(), FETCH_JOB_LIMIT)
            .await
            .map_err(ProtocolError::Queue)?;
        let jobs: Vec<JobDto> = jobs.iter().map(JobDto::from).collect();
        let count = jobs.len();
        Ok(JobListResponse { jobs, count })
    }

    /// `POST /jobs/{id}/complete`: applies an outcome report from the
    /// owning server.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::JobNotOwned`] when the job does not belong
    /// to the calling server and [`ProtocolError::CompletionConflict`] when
    /// it already carries an outcome.
    pub async fn complete_job(
        &self,
        bearer_token: &str,
        job_id: JobId,
        request: CompleteJobRequest,
    ) -> ProtocolResult<CompleteJobResponse> {
        let server = self.authenticate(bearer_token).await?;
        let outcome = request
            .into_outcome()
            .map_err(ProtocolError::InvalidCompletionStatus)?;
        let applied = self
            .queue
            .complete(job_id, server.id(), outcome)
            .await
            .map_err(|err| match err {
                JobQueueError::Repository(JobRepositoryError::NotFound(id)) => {
                    ProtocolError::JobNotOwned(id)
                }
                other => ProtocolError::Queue(other),
            })?;
        match applied {
            CompletionApply::Applied(job) => Ok(CompleteJobResponse {
                status: job.status().as_str().to_owned(),
                job_id: job.id(),
            }),
            CompletionApply::Conflict(job) => Err(ProtocolError::CompletionConflict(job.id())),
        }
    }

    /// `GET /provision/callback/{token}`: one-time agent registration.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownToken`] for unknown, consumed, or
    /// expired provision tokens.
    pub async fn provision_callback(
        &self,
        presented_token: &str,
        request: ProvisionCallbackRequest,
    ) -> ProtocolResult<ProvisionCallbackResponse> {
        let specs = ServerSpecs {
            os: request.os,
            cpu_cores: request.cpu_cores,
            memory_mb: request.memory_mb,
            disk_gb: request.disk_gb,
        };
        let facts = RegistrationFacts {
            ip_address: request.ip_address,
            public_key: request.public_key,
            specs: if specs.is_empty() { None } else { Some(specs) },
        };
        let credentials = self
            .registration
            .provision_callback(presented_token, facts)
            .await
            .map_err(|err| match err {
                RegistrationError::TokenRejected => ProtocolError::UnknownToken,
                other => ProtocolError::Registration(other),
            })?;
        info!(server_id = %credentials.server.id(), "provision callback accepted");
        Ok(ProvisionCallbackResponse {
            status: "registered".to_owned(),
            server_id: credentials.server.id(),
            agent_token: credentials.agent_token,
        })
    }

    /// `GET /firewall/confirm/{token}`: resolves an outstanding firewall
    /// confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownToken`] for unknown, resolved, or
    /// expired confirmation tokens.
    pub async fn confirm_firewall(
        &self,
        presented_token: &str,
    ) -> ProtocolResult<FirewallConfirmResponse> {
        let Some(rule) = self.firewall.confirm(presented_token).await? else {
            warn!("firewall confirmation with unknown token rejected");
            return Err(ProtocolError::UnknownToken);
        };
        Ok(FirewallConfirmResponse {
            status: "confirmed".to_owned(),
            rule_id: rule.id(),
        })
    }
}
