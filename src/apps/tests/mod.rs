//! App creation, port reservation, and completion handling over the
//! in-memory repositories.

mod domain;

use crate::apps::adapters::memory::{InMemoryProcessRepository, InMemoryWebAppRepository};
use crate::apps::services::WebAppService;
use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::services::{HandlerRegistry, JobQueueService};
use crate::netpool::domain::PortPool;
use crate::test_support::TestClock;
use std::sync::Arc;

type TestWebAppService = WebAppService<
    InMemoryWebAppRepository,
    InMemoryProcessRepository,
    InMemoryJobRepository,
    TestClock,
>;

struct Harness {
    service: TestWebAppService,
    apps: Arc<InMemoryWebAppRepository>,
    processes: Arc<InMemoryProcessRepository>,
    jobs: Arc<InMemoryJobRepository>,
    clock: Arc<TestClock>,
}

fn harness_with_pool(pool: PortPool) -> Harness {
    let clock = Arc::new(TestClock::fixed());
    let apps = Arc::new(InMemoryWebAppRepository::new());
    let processes = Arc::new(InMemoryProcessRepository::new());
    let jobs = Arc::new(InMemoryJobRepository::new());
    let queue = Arc::new(JobQueueService::new(
        Arc::clone(&jobs),
        Arc::clone(&clock),
        Arc::new(HandlerRegistry::new()),
    ));
    let service = WebAppService::new(
        Arc::clone(&apps),
        Arc::clone(&processes),
        pool,
        queue,
        Arc::clone(&clock),
    );
    Harness {
        service,
        apps,
        processes,
        jobs,
        clock,
    }
}

fn harness() -> Harness {
    let pool = PortPool::new(30000, 30009).expect("valid pool");
    harness_with_pool(pool)
}
