//! Shared wiring helpers for the in-memory control-plane tests.
//!
//! [`stack`] assembles the same service graph as the control-plane binary,
//! with every adapter swapped for its in-memory counterpart and the clock
//! replaced by a manually advanced one.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use fleetward::apps::adapters::memory::{InMemoryProcessRepository, InMemoryWebAppRepository};
use fleetward::apps::services::{CREATE_WEBAPP_JOB_TYPE, CreateWebAppHandler, WebAppService};
use fleetward::events::{CollectingEventPublisher, EventPublisher};
use fleetward::firewall::adapters::memory::InMemoryFirewallRuleRepository;
use fleetward::firewall::services::FirewallSafetyService;
use fleetward::job::adapters::memory::InMemoryJobRepository;
use fleetward::job::services::{HandlerRegistry, JobQueueService};
use fleetward::netpool::domain::PortPool;
use fleetward::protocol::AgentGateway;
use fleetward::protocol::dto::{CompleteJobRequest, JobDto, ProvisionCallbackRequest};
use fleetward::server::adapters::memory::{
    InMemoryMetricsRecorder, InMemoryServerRepository, InMemoryServiceRepository,
    InMemoryStepRepository,
};
use fleetward::server::domain::catalog::STANDARD_CATALOG;
use fleetward::server::domain::{ServerId, StackSelection, TenantId};
use fleetward::server::services::{
    CreateServerRequest, HeartbeatReconciler, ProvisioningService, RegistrationService,
    SERVICE_INSTALL_JOB_TYPE, ServiceInstallHandler, register_step_handlers,
};
use mockable::Clock;
use rstest::fixture;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

/// Boxed error type for test results.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Manually advanced clock shared by every service in the stack.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at a fixed, arbitrary instant.
    #[must_use]
    pub fn fixed() -> Self {
        let now = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now = *now + by;
        }
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

/// Gateway over the fully in-memory adapter set.
pub type Gateway = AgentGateway<
    InMemoryServerRepository,
    InMemoryStepRepository,
    InMemoryServiceRepository,
    InMemoryJobRepository,
    ManualClock,
    InMemoryMetricsRecorder,
    InMemoryFirewallRuleRepository,
>;

/// Firewall safety service over the in-memory rule store.
pub type Firewall =
    FirewallSafetyService<InMemoryFirewallRuleRepository, InMemoryJobRepository, ManualClock>;

/// Web app service over the in-memory app and process stores.
pub type WebApps = WebAppService<
    InMemoryWebAppRepository,
    InMemoryProcessRepository,
    InMemoryJobRepository,
    ManualClock,
>;

/// The complete in-memory control plane plus handles on its internals.
pub struct Stack {
    /// Agent-facing gateway, the entry point agents call.
    pub gateway: Gateway,
    /// Operator-facing registration service.
    pub registration: Arc<RegistrationService<InMemoryServerRepository, ManualClock>>,
    /// Operator-facing firewall safety service.
    pub firewall: Arc<Firewall>,
    /// Operator-facing web app service.
    pub web_apps: WebApps,
    /// Server store, for direct state assertions.
    pub servers: Arc<InMemoryServerRepository>,
    /// Provisioning step store.
    pub steps: Arc<InMemoryStepRepository>,
    /// Installed service store.
    pub services: Arc<InMemoryServiceRepository>,
    /// Web app store.
    pub apps: Arc<InMemoryWebAppRepository>,
    /// App process store.
    pub processes: Arc<InMemoryProcessRepository>,
    /// Captured domain events.
    pub events: Arc<CollectingEventPublisher>,
    /// Shared manual clock.
    pub clock: Arc<ManualClock>,
}

/// Provides a tokio runtime for async operations in tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
#[fixture]
pub fn runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Provides a freshly wired in-memory control plane.
///
/// Mirrors the binary wiring: the provisioning service enqueues through a
/// dispatch-free queue, while the gateway queue carries the sealed handler
/// registry covering catalog steps, service installs, and web app creation.
///
/// # Errors
///
/// Returns an error if the handler registry wiring is inconsistent.
#[fixture]
pub fn stack() -> Result<Stack, BoxError> {
    let clock = Arc::new(ManualClock::fixed());
    let events = Arc::new(CollectingEventPublisher::new());
    let servers = Arc::new(InMemoryServerRepository::new());
    let steps = Arc::new(InMemoryStepRepository::new());
    let services = Arc::new(InMemoryServiceRepository::new());
    let jobs = Arc::new(InMemoryJobRepository::new());
    let metrics = Arc::new(InMemoryMetricsRecorder::new());
    let rules = Arc::new(InMemoryFirewallRuleRepository::new());
    let apps = Arc::new(InMemoryWebAppRepository::new());
    let processes = Arc::new(InMemoryProcessRepository::new());

    let enqueue_queue = Arc::new(JobQueueService::new(
        Arc::clone(&jobs),
        Arc::clone(&clock),
        Arc::new(HandlerRegistry::new()),
    ));
    let provisioning = Arc::new(ProvisioningService::new(
        Arc::clone(&servers),
        Arc::clone(&steps),
        Arc::clone(&services),
        enqueue_queue,
        Arc::clone(&events) as Arc<dyn EventPublisher>,
        Arc::clone(&clock),
    ));

    let mut registry = HandlerRegistry::new();
    register_step_handlers(&mut registry, &provisioning)?;
    registry.register(
        SERVICE_INSTALL_JOB_TYPE,
        Arc::new(ServiceInstallHandler::new(
            Arc::clone(&services),
            Arc::clone(&clock),
        )),
    )?;
    registry.register(
        CREATE_WEBAPP_JOB_TYPE,
        Arc::new(CreateWebAppHandler::new(
            Arc::clone(&apps),
            Arc::clone(&processes),
            Arc::clone(&clock),
        )),
    )?;
    let mut expected: Vec<&str> = STANDARD_CATALOG
        .iter()
        .map(|entry| entry.step_type)
        .collect();
    expected.push(SERVICE_INSTALL_JOB_TYPE);
    expected.push(CREATE_WEBAPP_JOB_TYPE);
    registry.ensure_registered(&expected)?;

    let queue = Arc::new(JobQueueService::new(
        Arc::clone(&jobs),
        Arc::clone(&clock),
        Arc::new(registry),
    ));
    let registration = Arc::new(RegistrationService::new(
        Arc::clone(&servers),
        Arc::clone(&events) as Arc<dyn EventPublisher>,
        Arc::clone(&clock),
    ));
    let reconciler = Arc::new(HeartbeatReconciler::new(
        Arc::clone(&servers),
        provisioning,
        metrics,
        Arc::clone(&events) as Arc<dyn EventPublisher>,
        Arc::clone(&clock),
    ));
    let firewall = Arc::new(FirewallSafetyService::new(
        rules,
        Arc::clone(&queue),
        Arc::clone(&events) as Arc<dyn EventPublisher>,
        Arc::clone(&clock),
    ));
    let pool = PortPool::new(30000, 30999)?;
    let web_apps = WebAppService::new(
        Arc::clone(&apps),
        Arc::clone(&processes),
        pool,
        Arc::clone(&queue),
        Arc::clone(&clock),
    );
    let gateway = AgentGateway::new(
        Arc::clone(&registration),
        reconciler,
        Arc::clone(&queue),
        Arc::clone(&firewall),
        Arc::clone(&clock),
    );

    Ok(Stack {
        gateway,
        registration,
        firewall,
        web_apps,
        servers,
        steps,
        services,
        apps,
        processes,
        events,
        clock,
    })
}

/// Creates a server with the default stack and walks it through the
/// provision callback, returning the agent's bearer credentials.
///
/// # Errors
///
/// Returns an error if server creation or the callback fails.
pub fn register_agent(
    rt: &Runtime,
    stack: &Stack,
    name: &str,
) -> Result<(ServerId, TenantId, String), BoxError> {
    let tenant_id = TenantId::new();
    let created = rt.block_on(stack.registration.create_server(CreateServerRequest::new(
        tenant_id,
        name,
        StackSelection::default(),
    )))?;
    let response = rt.block_on(stack.gateway.provision_callback(
        &created.provision_token,
        ProvisionCallbackRequest {
            ip_address: Some("203.0.113.10".to_owned()),
            public_key: Some("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5".to_owned()),
            os: Some("Ubuntu 24.04".to_owned()),
            cpu_cores: Some(4),
            memory_mb: Some(8192),
            disk_gb: Some(160),
        },
    ))?;
    Ok((response.server_id, tenant_id, response.agent_token))
}

/// Polls the gateway until no jobs remain, reporting every claimed job with
/// the given terminal status, and returns the jobs in claim order.
///
/// # Errors
///
/// Returns an error if a poll or a completion report fails.
pub fn drain_jobs(
    rt: &Runtime,
    stack: &Stack,
    bearer_token: &str,
    status: &str,
) -> Result<Vec<JobDto>, BoxError> {
    let mut drained = Vec::new();
    loop {
        let batch = rt.block_on(stack.gateway.fetch_jobs(bearer_token))?;
        if batch.jobs.is_empty() {
            return Ok(drained);
        }
        for job in batch.jobs {
            rt.block_on(stack.gateway.complete_job(
                bearer_token,
                job.id,
                CompleteJobRequest {
                    status: status.to_owned(),
                    output: Some("ok".to_owned()),
                    error: None,
                    exit_code: Some(0),
                },
            ))?;
            drained.push(job);
        }
    }
}

/// Reports a single job back through the gateway with an explicit outcome.
///
/// # Errors
///
/// Returns an error if the completion report fails.
pub fn report_job(
    rt: &Runtime,
    stack: &Stack,
    bearer_token: &str,
    job: &JobDto,
    request: CompleteJobRequest,
) -> Result<(), BoxError> {
    rt.block_on(stack.gateway.complete_job(bearer_token, job.id, request))?;
    Ok(())
}
