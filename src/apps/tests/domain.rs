use crate::apps::domain::{
    AppDomainError, AppProcess, AppRuntime, ProcessStatus, WebApp, WebAppStatus,
};
use crate::server::domain::{ServerId, TenantId};
use crate::test_support::TestClock;
use rstest::rstest;

fn pending_app(runtime: AppRuntime) -> WebApp {
    let clock = TestClock::fixed();
    WebApp::new(
        ServerId::new(),
        TenantId::new(),
        "blog.example.com",
        "deploy",
        runtime,
        clock.now(),
    )
}

#[rstest]
#[case::php(AppRuntime::Php, false)]
#[case::node(AppRuntime::Node, true)]
fn runtime_port_requirement(#[case] runtime: AppRuntime, #[case] needs_port: bool) {
    assert_eq!(runtime.needs_port(), needs_port);
}

#[test]
fn new_app_starts_pending_without_a_port() {
    let app = pending_app(AppRuntime::Php);
    assert_eq!(app.status(), WebAppStatus::Pending);
    assert_eq!(app.port(), None);
    assert_eq!(app.error(), None);
}

#[test]
fn activation_resolves_a_pending_app() {
    let clock = TestClock::fixed();
    let mut app = pending_app(AppRuntime::Php);
    app.activate(clock.now()).expect("activate");
    assert_eq!(app.status(), WebAppStatus::Active);

    let err = app.activate(clock.now()).expect_err("already resolved");
    assert!(matches!(
        err,
        AppDomainError::InvalidStatusTransition {
            from: WebAppStatus::Active,
            ..
        }
    ));
}

#[test]
fn failure_records_the_remote_error() {
    let clock = TestClock::fixed();
    let mut app = pending_app(AppRuntime::Node);
    app.fail("npm install exited 1", clock.now()).expect("fail");
    assert_eq!(app.status(), WebAppStatus::Failed);
    assert_eq!(app.error(), Some("npm install exited 1"));

    let err = app
        .fail("late duplicate", clock.now())
        .expect_err("already resolved");
    assert!(matches!(
        err,
        AppDomainError::InvalidStatusTransition {
            from: WebAppStatus::Failed,
            ..
        }
    ));
}

#[test]
fn process_runs_once() {
    let clock = TestClock::fixed();
    let mut process = AppProcess::new(
        ServerId::new(),
        None,
        "blog-node",
        "node server.js --port 30000",
        Some(30000),
        clock.now(),
    );
    assert_eq!(process.status(), ProcessStatus::Pending);
    process.mark_running(clock.now()).expect("mark running");
    assert_eq!(process.status(), ProcessStatus::Running);

    let err = process
        .mark_running(clock.now())
        .expect_err("already running");
    assert!(matches!(err, AppDomainError::InvalidProcessTransition { .. }));
}

#[rstest]
#[case("php", AppRuntime::Php)]
#[case(" NODE ", AppRuntime::Node)]
fn runtime_parses_case_insensitively(#[case] raw: &str, #[case] expected: AppRuntime) {
    assert_eq!(AppRuntime::try_from(raw).expect("parse"), expected);
}

#[test]
fn unknown_runtime_is_rejected() {
    assert!(AppRuntime::try_from("ruby").is_err());
}
