use crate::job::domain::{Job, JobOutcome};
use crate::job::services::{
    CompletionHandler, CompletionHandlerError, HandlerRegistry, HandlerRegistryError,
};
use crate::server::domain::{ServerId, TenantId};
use crate::test_support::TestClock;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl CompletionHandler for CountingHandler {
    async fn on_complete(&self, _job: &Job) -> Result<(), CompletionHandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CompletionHandlerError::new(std::io::Error::other(
                "handler broke",
            )));
        }
        Ok(())
    }
}

fn terminal_job(job_type: &str) -> Job {
    let clock = TestClock::fixed();
    let mut job = Job::new(
        ServerId::new(),
        TenantId::new(),
        job_type,
        json!({}),
        5,
        3,
        clock.now(),
    );
    job.claim(clock.now()).expect("claim");
    job.finish(
        &JobOutcome::Completed {
            output: None,
            exit_code: Some(0),
        },
        clock.now(),
    )
    .expect("finish");
    job
}

#[tokio::test]
async fn dispatch_invokes_the_registered_handler() {
    let handler = Arc::new(CountingHandler::default());
    let mut registry = HandlerRegistry::new();
    registry
        .register("service_install", Arc::clone(&handler) as Arc<dyn CompletionHandler>)
        .expect("register");

    registry.dispatch(&terminal_job("service_install")).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_job_types_are_a_silent_no_op() {
    let registry = HandlerRegistry::new();
    registry.dispatch(&terminal_job("future_job_type")).await;
}

#[tokio::test]
async fn handler_failures_are_swallowed() {
    let handler = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
        fail: true,
    });
    let mut registry = HandlerRegistry::new();
    registry
        .register("service_install", Arc::clone(&handler) as Arc<dyn CompletionHandler>)
        .expect("register");

    registry.dispatch(&terminal_job("service_install")).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = HandlerRegistry::new();
    registry
        .register("service_install", Arc::new(CountingHandler::default()) as Arc<dyn CompletionHandler>)
        .expect("first registration");
    let err = registry
        .register("service_install", Arc::new(CountingHandler::default()) as Arc<dyn CompletionHandler>)
        .expect_err("second registration");
    assert_eq!(
        err,
        HandlerRegistryError::DuplicateType("service_install".to_owned())
    );
}

#[test]
fn ensure_registered_names_the_missing_type() {
    let mut registry = HandlerRegistry::new();
    registry
        .register("service_install", Arc::new(CountingHandler::default()) as Arc<dyn CompletionHandler>)
        .expect("register");

    registry
        .ensure_registered(&["service_install"])
        .expect("all present");
    let err = registry
        .ensure_registered(&["service_install", "create_webapp"])
        .expect_err("missing type");
    assert_eq!(
        err,
        HandlerRegistryError::MissingType("create_webapp".to_owned())
    );
}
