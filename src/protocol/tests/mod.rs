//! Gateway behaviour over a fully in-memory service wiring.

mod dto;
mod gateway;

use crate::events::CollectingEventPublisher;
use crate::firewall::adapters::memory::InMemoryFirewallRuleRepository;
use crate::firewall::services::FirewallSafetyService;
use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::services::{HandlerRegistry, JobQueueService};
use crate::protocol::AgentGateway;
use crate::server::adapters::memory::{
    InMemoryMetricsRecorder, InMemoryServerRepository, InMemoryServiceRepository,
    InMemoryStepRepository,
};
use crate::server::domain::{StackSelection, TenantId};
use crate::server::services::{
    CreateServerRequest, HeartbeatReconciler, ProvisioningService, RegistrationService,
};
use crate::test_support::TestClock;
use std::sync::Arc;

type TestGateway = AgentGateway<
    InMemoryServerRepository,
    InMemoryStepRepository,
    InMemoryServiceRepository,
    InMemoryJobRepository,
    TestClock,
    InMemoryMetricsRecorder,
    InMemoryFirewallRuleRepository,
>;

type TestQueue = JobQueueService<InMemoryJobRepository, TestClock>;
type TestFirewall =
    FirewallSafetyService<InMemoryFirewallRuleRepository, InMemoryJobRepository, TestClock>;

struct Harness {
    gateway: TestGateway,
    registration: Arc<RegistrationService<InMemoryServerRepository, TestClock>>,
    queue: Arc<TestQueue>,
    firewall: Arc<TestFirewall>,
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
        Arc::clone(&queue),
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    ));
    let registration = Arc::new(RegistrationService::new(
        Arc::clone(&servers),
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    ));
    let reconciler = Arc::new(HeartbeatReconciler::new(
        Arc::clone(&servers),
        provisioning,
        metrics,
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    ));
    let firewall = Arc::new(FirewallSafetyService::new(
        Arc::new(InMemoryFirewallRuleRepository::new()),
        Arc::clone(&queue),
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
    ));
    let gateway = AgentGateway::new(
        Arc::clone(&registration),
        reconciler,
        Arc::clone(&queue),
        Arc::clone(&firewall),
        Arc::clone(&clock),
    );
    Harness {
        gateway,
        registration,
        queue,
        firewall,
        clock,
    }
}

/// Creates a server and registers its agent through the gateway, returning
/// the server identifier, tenant, and bearer token.
async fn registered_agent(fixture: &Harness) -> (crate::server::domain::ServerId, TenantId, String) {
    let tenant_id = TenantId::new();
    let created = fixture
        .registration
        .create_server(CreateServerRequest::new(
            tenant_id,
            "web-01",
            StackSelection::default(),
        ))
        .await
        .expect("create server");
    let response = fixture
        .gateway
        .provision_callback(
            &created.provision_token,
            crate::protocol::dto::ProvisionCallbackRequest::default(),
        )
        .await
        .expect("provision callback");
    (response.server_id, tenant_id, response.agent_token)
}
