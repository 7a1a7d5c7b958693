//! Web app creation and completion handling.

use super::site_config::{SiteConfigError, app_root, render_site_config};
use crate::apps::domain::{AppDomainError, AppId, AppProcess, AppRuntime, WebApp};
use crate::apps::ports::{
    ProcessRepository, ProcessRepositoryError, WebAppRepository, WebAppRepositoryError,
};
use crate::job::domain::JobStatus;
use crate::job::ports::JobRepository;
use crate::job::services::{
    CompletionHandler, CompletionHandlerError, EnqueueJobRequest, JobQueueError, JobQueueService,
};
use crate::netpool::domain::{PortAllocationError, PortPool};
use crate::netpool::services::PortAllocator;
use crate::server::domain::{ServerId, TenantId};
use async_trait::async_trait;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Job type executed by the agent to create an app remotely.
pub const CREATE_WEBAPP_JOB_TYPE: &str = "create_webapp";

/// How many times creation retries after losing a port race.
const MAX_PORT_ATTEMPTS: u32 = 3;

/// Payload contract between app creation and the agent's `create_webapp`
/// command handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWebAppPayload {
    /// App the job reports back against.
    pub app_id: AppId,
    /// Site domain.
    pub domain: String,
    /// System user the app runs as.
    pub system_user: String,
    /// App runtime.
    pub runtime: AppRuntime,
    /// Allocated port for Node apps.
    pub port: Option<u16>,
    /// On-server root directory.
    pub app_root: String,
    /// SSH public key to authorize for deployments, if any.
    pub public_key: Option<String>,
    /// Generated web server site block.
    pub server_config: String,
}

/// Request payload for creating a web app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWebAppRequest {
    server_id: ServerId,
    tenant_id: TenantId,
    domain: String,
    system_user: String,
    runtime: AppRuntime,
    public_key: Option<String>,
}

impl CreateWebAppRequest {
    /// Creates a request with required fields.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        tenant_id: TenantId,
        domain: impl Into<String>,
        system_user: impl Into<String>,
        runtime: AppRuntime,
    ) -> Self {
        Self {
            server_id,
            tenant_id,
            domain: domain.into(),
            system_user: system_user.into(),
            runtime,
            public_key: None,
        }
    }

    /// Authorizes an SSH public key for deployments.
    #[must_use]
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }
}

/// Service-level errors for app operations.
#[derive(Debug, Error)]
pub enum WebAppServiceError {
    /// Domain transition failed.
    #[error(transparent)]
    Domain(#[from] AppDomainError),
    /// App persistence failed.
    #[error(transparent)]
    Apps(#[from] WebAppRepositoryError),
    /// Process persistence failed.
    #[error(transparent)]
    Processes(#[from] ProcessRepositoryError),
    /// Port selection failed.
    #[error(transparent)]
    Allocation(#[from] PortAllocationError),
    /// Creation job could not be enqueued.
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    /// Site config rendering failed.
    #[error(transparent)]
    Config(#[from] SiteConfigError),
    /// Job payload serialization failed.
    #[error("failed to serialize job payload: {0}")]
    Payload(#[from] serde_json::Error),
    /// Every allocation attempt lost the port race.
    #[error("gave up reserving a port after {attempts} contended attempts")]
    PortContention {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Result type for app service operations.
pub type WebAppServiceResult<T> = Result<T, WebAppServiceError>;

/// Orchestrates app creation: port reservation, persistence, and the
/// remote creation job.
#[derive(Clone)]
pub struct WebAppService<W, P, J, C>
where
    W: WebAppRepository,
    P: ProcessRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    apps: Arc<W>,
    processes: Arc<P>,
    allocator: PortAllocator<P>,
    queue: Arc<JobQueueService<J, C>>,
    clock: Arc<C>,
}

impl<W, P, J, C> WebAppService<W, P, J, C>
where
    W: WebAppRepository,
    P: ProcessRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
{
    /// Creates the service over its repositories, port pool, queue, and
    /// clock.
    #[must_use]
    pub fn new(
        apps: Arc<W>,
        processes: Arc<P>,
        pool: PortPool,
        queue: Arc<JobQueueService<J, C>>,
        clock: Arc<C>,
    ) -> Self {
        let allocator = PortAllocator::new(pool, Arc::clone(&processes));
        Self {
            apps,
            processes,
            allocator,
            queue,
            clock,
        }
    }

    /// Returns the port allocator backing this service.
    #[must_use]
    pub const fn allocator(&self) -> &PortAllocator<P> {
        &self.allocator
    }

    /// Creates a pending app and enqueues its remote creation job.
    ///
    /// Node apps reserve a port first by inserting a pending process row;
    /// losing the reservation race to a concurrent creation retries with a
    /// fresh port up to a small bound.
    ///
    /// # Errors
    ///
    /// Returns [`WebAppServiceError`] when port reservation, persistence,
    /// rendering, or enqueueing fails. Reserved ports are released on
    /// failure.
    pub async fn create(&self, request: CreateWebAppRequest) -> WebAppServiceResult<WebApp> {
        let now = self.clock.utc();
        let mut app = WebApp::new(
            request.server_id,
            request.tenant_id,
            request.domain,
            request.system_user,
            request.runtime,
            now,
        );

        let reservation = if request.runtime.needs_port() {
            Some(self.reserve_port(&mut app).await?)
        } else {
            None
        };

        match self.persist_and_enqueue(&app, request.public_key).await {
            Ok(()) => {
                info!(
                    app_id = %app.id(),
                    domain = app.domain(),
                    runtime = %app.runtime(),
                    port = app.port(),
                    "web app creation enqueued"
                );
                Ok(app)
            }
            Err(err) => {
                if let Some(process) = reservation {
                    self.release_reservation(&process).await;
                }
                Err(err)
            }
        }
    }

    /// Finds an app by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WebAppServiceError::Apps`] when lookup fails.
    pub async fn find(&self, app_id: AppId) -> WebAppServiceResult<Option<WebApp>> {
        Ok(self.apps.find_by_id(app_id).await?)
    }

    /// Lists the apps hosted on a server.
    ///
    /// # Errors
    ///
    /// Returns [`WebAppServiceError::Apps`] when listing fails.
    pub async fn list_for_server(&self, server_id: ServerId) -> WebAppServiceResult<Vec<WebApp>> {
        Ok(self.apps.list_for_server(server_id).await?)
    }

    async fn reserve_port(&self, app: &mut WebApp) -> WebAppServiceResult<AppProcess> {
        let now = self.clock.utc();
        for _ in 0..MAX_PORT_ATTEMPTS {
            let port = self.allocator.allocate(app.server_id()).await?;
            let process = AppProcess::new(
                app.server_id(),
                Some(app.id()),
                format!("{}-node", app.domain()),
                format!("node {}/server.js --port {port}", app_root(app)),
                Some(port),
                now,
            );
            match self.processes.insert(&process).await {
                Ok(()) => {
                    app.assign_port(port);
                    return Ok(process);
                }
                Err(ProcessRepositoryError::PortInUse { server_id, port: contested }) => {
                    warn!(
                        server_id = %server_id,
                        port = contested,
                        "lost port reservation race, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(WebAppServiceError::PortContention {
            attempts: MAX_PORT_ATTEMPTS,
        })
    }

    async fn persist_and_enqueue(
        &self,
        app: &WebApp,
        public_key: Option<String>,
    ) -> WebAppServiceResult<()> {
        let server_config = render_site_config(app)?;
        self.apps.insert(app).await?;
        let payload = CreateWebAppPayload {
            app_id: app.id(),
            domain: app.domain().to_owned(),
            system_user: app.system_user().to_owned(),
            runtime: app.runtime(),
            port: app.port(),
            app_root: app_root(app),
            public_key,
            server_config,
        };
        self.queue
            .enqueue(EnqueueJobRequest::new(
                app.server_id(),
                app.tenant_id(),
                CREATE_WEBAPP_JOB_TYPE,
                serde_json::to_value(&payload)?,
            ))
            .await?;
        Ok(())
    }

    async fn release_reservation(&self, process: &AppProcess) {
        if let Err(err) = self.processes.delete(process.id()).await {
            warn!(
                process_id = %process.id(),
                error = %err,
                "failed to release port reservation after creation error"
            );
        }
    }
}

/// Completion handler for `create_webapp` jobs: activates or fails the app
/// and resolves its reserved supervisor process.
pub struct CreateWebAppHandler<W, P, C>
where
    W: WebAppRepository,
    P: ProcessRepository,
    C: Clock + Send + Sync,
{
    apps: Arc<W>,
    processes: Arc<P>,
    clock: Arc<C>,
}

impl<W, P, C> CreateWebAppHandler<W, P, C>
where
    W: WebAppRepository,
    P: ProcessRepository,
    C: Clock + Send + Sync,
{
    /// Creates the handler over the app and process repositories.
    #[must_use]
    pub const fn new(apps: Arc<W>, processes: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            apps,
            processes,
            clock,
        }
    }

    async fn activate(&self, mut app: WebApp) -> Result<(), CompletionHandlerError> {
        let now = self.clock.utc();
        app.activate(now).map_err(CompletionHandlerError::new)?;
        self.apps
            .update(&app)
            .await
            .map_err(CompletionHandlerError::new)?;
        let processes = self
            .processes
            .find_by_app(app.id())
            .await
            .map_err(CompletionHandlerError::new)?;
        for mut process in processes {
            process
                .mark_running(now)
                .map_err(CompletionHandlerError::new)?;
            self.processes
                .update(&process)
                .await
                .map_err(CompletionHandlerError::new)?;
        }
        info!(app_id = %app.id(), domain = app.domain(), "web app activated");
        Ok(())
    }

    async fn fail(&self, mut app: WebApp, error: &str) -> Result<(), CompletionHandlerError> {
        let now = self.clock.utc();
        app.fail(error, now).map_err(CompletionHandlerError::new)?;
        self.apps
            .update(&app)
            .await
            .map_err(CompletionHandlerError::new)?;
        let processes = self
            .processes
            .find_by_app(app.id())
            .await
            .map_err(CompletionHandlerError::new)?;
        for process in processes {
            self.processes
                .delete(process.id())
                .await
                .map_err(CompletionHandlerError::new)?;
        }
        warn!(app_id = %app.id(), domain = app.domain(), error, "web app creation failed");
        Ok(())
    }
}

#[async_trait]
impl<W, P, C> CompletionHandler for CreateWebAppHandler<W, P, C>
where
    W: WebAppRepository,
    P: ProcessRepository,
    C: Clock + Send + Sync,
{
    async fn on_complete(&self, job: &crate::job::domain::Job) -> Result<(), CompletionHandlerError> {
        let payload: CreateWebAppPayload =
            serde_json::from_value(job.payload().clone()).map_err(CompletionHandlerError::new)?;
        let Some(app) = self
            .apps
            .find_by_id(payload.app_id)
            .await
            .map_err(CompletionHandlerError::new)?
        else {
            warn!(app_id = %payload.app_id, "completion for unknown app ignored");
            return Ok(());
        };
        if job.status() == JobStatus::Completed {
            self.activate(app).await
        } else {
            self.fail(app, job.error().unwrap_or("remote app creation failed"))
                .await
        }
    }
}
