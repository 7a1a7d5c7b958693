//! Registration, provisioning, and heartbeat reconciliation over the
//! in-memory repositories.

mod handlers;
mod provisioning;
mod reconciler;

use crate::events::CollectingEventPublisher;
use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::services::{HandlerRegistry, JobQueueService};
use crate::server::adapters::memory::{
    InMemoryMetricsRecorder, InMemoryServerRepository, InMemoryServiceRepository,
    InMemoryStepRepository,
};
use crate::server::domain::StackSelection;
use crate::server::services::{
    CreateServerRequest, HeartbeatReconciler, ProvisioningService, RegistrationFacts,
    RegistrationService,
};
use crate::server::domain::Server;
use crate::test_support::TestClock;
use std::sync::Arc;

type TestProvisioning = ProvisioningService<
    InMemoryServerRepository,
    InMemoryStepRepository,
    InMemoryServiceRepository,
    InMemoryJobRepository,
    TestClock,
>;

type TestReconciler = HeartbeatReconciler<
    InMemoryServerRepository,
    InMemoryStepRepository,
    InMemoryServiceRepository,
    InMemoryJobRepository,
    TestClock,
    InMemoryMetricsRecorder,
>;

struct Harness {
    registration: RegistrationService<InMemoryServerRepository, TestClock>,
    provisioning: Arc<TestProvisioning>,
    reconciler: TestReconciler,
    servers: Arc<InMemoryServerRepository>,
    steps: Arc<InMemoryStepRepository>,
    services: Arc<InMemoryServiceRepository>,
    jobs: Arc<InMemoryJobRepository>,
    metrics: Arc<InMemoryMetricsRecorder>,
    events: Arc<CollectingEventPublisher>,
    clock: Arc<TestClock>,
}

fn harness() -> Harness {
    let clock = Arc::new(TestClock::fixed());
    let servers = Arc::new(InMemoryServerRepository::new());
    let steps = Arc::new(InMemoryStepRepository::new());
    let services = Arc::new(InMemoryServiceRepository::new());
    let jobs = Arc::new(InMemoryJobRepository::new());
    let metrics = Arc::new(InMemoryMetricsRecorder::new());
    let events = Arc::new(CollectingEventPublisher::new());
    let queue = Arc::new(JobQueueService::new(
        Arc::clone(&jobs),
        Arc::clone(&clock),
        Arc::new(HandlerRegistry::new()),
    ));
    let provisioning = Arc::new(ProvisioningService::new(
        Arc::clone(&servers),
        Arc::clone(&steps),
        Arc::clone(&services),
        queue,
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    ));
    let registration = RegistrationService::new(
        Arc::clone(&servers),
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    );
    let reconciler = HeartbeatReconciler::new(
        Arc::clone(&servers),
        Arc::clone(&provisioning),
        Arc::clone(&metrics),
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    );
    Harness {
        registration,
        provisioning,
        reconciler,
        servers,
        steps,
        services,
        jobs,
        metrics,
        events,
        clock,
    }
}

/// Creates a server with the default stack and runs its provision callback,
/// leaving it provisioning in the bootstrap phase.
async fn registered_server(harness: &Harness) -> (Server, String) {
    let created = harness
        .registration
        .create_server(CreateServerRequest::new(
            crate::server::domain::TenantId::new(),
            "web-01",
            StackSelection::default(),
        ))
        .await
        .expect("create server");
    let credentials = harness
        .registration
        .provision_callback(&created.provision_token, RegistrationFacts::default())
        .await
        .expect("provision callback");
    (credentials.server, credentials.agent_token)
}
