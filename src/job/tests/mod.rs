//! Queue behaviour over the in-memory repository.

mod dispatch;

use crate::job::adapters::memory::InMemoryJobRepository;
use crate::job::services::{HandlerRegistry, JobQueueService};
use crate::test_support::TestClock;
use std::sync::Arc;

type TestQueue = JobQueueService<InMemoryJobRepository, TestClock>;

fn queue_with_clock(clock: Arc<TestClock>) -> TestQueue {
    JobQueueService::new(
        Arc::new(InMemoryJobRepository::new()),
        clock,
        Arc::new(HandlerRegistry::new()),
    )
}

fn queue() -> TestQueue {
    queue_with_clock(Arc::new(TestClock::fixed()))
}
