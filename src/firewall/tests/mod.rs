//! Confirm-or-rollback behaviour over the in-memory rule repository.

mod rules;

use crate::events::CollectingEventPublisher;
use crate::firewall::adapters::memory::InMemoryFirewallRuleRepository;
use crate::firewall::services::FirewallSafetyService;
use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::services::{HandlerRegistry, JobQueueService};
use crate::test_support::TestClock;
use chrono::Duration;
use std::sync::Arc;

type TestSafety =
    FirewallSafetyService<InMemoryFirewallRuleRepository, InMemoryJobRepository, TestClock>;

struct Harness {
    safety: TestSafety,
    jobs: Arc<InMemoryJobRepository>,
    events: Arc<CollectingEventPublisher>,
    clock: Arc<TestClock>,
}

fn harness_with_timeout(timeout: Duration) -> Harness {
    let clock = Arc::new(TestClock::fixed());
    let jobs = Arc::new(InMemoryJobRepository::new());
    let events = Arc::new(CollectingEventPublisher::new());
    let queue = Arc::new(JobQueueService::new(
        Arc::clone(&jobs),
        Arc::clone(&clock),
        Arc::new(HandlerRegistry::new()),
    ));
    let safety = FirewallSafetyService::with_timeout(
        Arc::new(InMemoryFirewallRuleRepository::new()),
        queue,
        Arc::clone(&events) as Arc<dyn crate::events::EventPublisher>,
        Arc::clone(&clock),
        timeout,
    );
    Harness {
        safety,
        jobs,
        events,
        clock,
    }
}

fn harness() -> Harness {
    harness_with_timeout(Duration::seconds(300))
}
