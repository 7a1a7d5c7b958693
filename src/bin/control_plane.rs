//! Control-plane binary: wires the `PostgreSQL` adapters, domain services,
//! and agent gateway, runs the firewall rollback sweep, and serves the
//! agent-facing HTTP protocol.

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use fleetward::apps::adapters::postgres::{PostgresProcessRepository, PostgresWebAppRepository};
use fleetward::apps::services::{CREATE_WEBAPP_JOB_TYPE, CreateWebAppHandler};
use fleetward::config::Config;
use fleetward::events::{EventPublisher, TracingEventPublisher};
use fleetward::firewall::adapters::postgres::PostgresFirewallRuleRepository;
use fleetward::firewall::services::FirewallSafetyService;
use fleetward::job::adapters::postgres::PostgresJobRepository;
use fleetward::job::services::{HandlerRegistry, JobQueueService};
use fleetward::netpool::domain::PortPool;
use fleetward::protocol::{AgentGateway, routes};
use fleetward::server::adapters::postgres::{
    PostgresMetricsRecorder, PostgresServerRepository, PostgresServiceRepository,
    PostgresStepRepository,
};
use fleetward::server::domain::catalog::STANDARD_CATALOG;
use fleetward::server::services::{
    HeartbeatReconciler, ProvisioningService, RegistrationService, SERVICE_INSTALL_JOB_TYPE,
    ServiceInstallHandler, register_step_handlers,
};
use mockable::DefaultClock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    // Fail fast on a nonsensical pool before any agent traffic arrives.
    PortPool::new(config.port_pool_min, config.port_pool_max)?;

    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder().build(manager)?;

    let clock = Arc::new(DefaultClock);
    let events: Arc<dyn EventPublisher> = Arc::new(TracingEventPublisher);

    let jobs = Arc::new(PostgresJobRepository::new(pool.clone()));
    let servers = Arc::new(PostgresServerRepository::new(pool.clone()));
    let steps = Arc::new(PostgresStepRepository::new(pool.clone()));
    let services = Arc::new(PostgresServiceRepository::new(pool.clone()));
    let metrics = Arc::new(PostgresMetricsRecorder::new(pool.clone()));
    let rules = Arc::new(PostgresFirewallRuleRepository::new(pool.clone()));
    let apps = Arc::new(PostgresWebAppRepository::new(pool.clone()));
    let processes = Arc::new(PostgresProcessRepository::new(pool));

    // The provisioning service only enqueues; completion dispatch runs
    // through the gateway queue built once the registry is sealed.
    let enqueue_queue = Arc::new(JobQueueService::new(
        Arc::clone(&jobs),
        Arc::clone(&clock),
        Arc::new(HandlerRegistry::new()),
    ));
    let provisioning = Arc::new(ProvisioningService::new(
        Arc::clone(&servers),
        steps,
        Arc::clone(&services),
        enqueue_queue,
        Arc::clone(&events),
        Arc::clone(&clock),
    ));

    let mut registry = HandlerRegistry::new();
    register_step_handlers(&mut registry, &provisioning)?;
    registry.register(
        SERVICE_INSTALL_JOB_TYPE,
        Arc::new(ServiceInstallHandler::new(services, Arc::clone(&clock))),
    )?;
    registry.register(
        CREATE_WEBAPP_JOB_TYPE,
        Arc::new(CreateWebAppHandler::new(apps, processes, Arc::clone(&clock))),
    )?;
    let mut expected: Vec<&str> = STANDARD_CATALOG
        .iter()
        .map(|entry| entry.step_type)
        .collect();
    expected.push(SERVICE_INSTALL_JOB_TYPE);
    expected.push(CREATE_WEBAPP_JOB_TYPE);
    registry.ensure_registered(&expected)?;

    let queue = Arc::new(JobQueueService::new(
        jobs,
        Arc::clone(&clock),
        Arc::new(registry),
    ));
    let registration = Arc::new(RegistrationService::new(
        Arc::clone(&servers),
        Arc::clone(&events),
        Arc::clone(&clock),
    ));
    let reconciler = Arc::new(HeartbeatReconciler::new(
        servers,
        provisioning,
        metrics,
        Arc::clone(&events),
        Arc::clone(&clock),
    ));
    let firewall = Arc::new(FirewallSafetyService::with_timeout(
        rules,
        Arc::clone(&queue),
        events,
        Arc::clone(&clock),
        chrono::Duration::seconds(config.firewall_timeout_secs),
    ));

    let sweeper = Arc::clone(&firewall);
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match sweeper.sweep().await {
                Ok(rolled_back) if !rolled_back.is_empty() => {
                    info!(count = rolled_back.len(), "rolled back unconfirmed firewall rules");
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "firewall sweep failed"),
            }
        }
    });

    let gateway = Arc::new(AgentGateway::new(
        registration,
        reconciler,
        queue,
        firewall,
        clock,
    ));

    info!(listen_addr = %config.listen_addr, "control plane listening");
    warp::serve(routes(gateway)).run(config.listen_addr).await;
    Ok(())
}
