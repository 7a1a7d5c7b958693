use super::{Harness, harness};
use crate::job::domain::{Job, JobOutcome};
use crate::job::services::CompletionHandler;
use crate::server::domain::{ServerId, ServiceStatus, TenantId};
use crate::server::ports::ServiceRepository;
use crate::server::services::{ServiceInstallHandler, ServiceInstallPayload};
use std::sync::Arc;

fn install_job(
    fixture: &Harness,
    server_id: ServerId,
    payload: &ServiceInstallPayload,
    outcome: &JobOutcome,
) -> Job {
    let mut job = Job::new(
        server_id,
        TenantId::new(),
        "service_install",
        serde_json::to_value(payload).expect("serialize"),
        5,
        3,
        fixture.clock.now(),
    );
    job.claim(fixture.clock.now()).expect("claim");
    job.finish(outcome, fixture.clock.now()).expect("finish");
    job
}

fn handler(
    fixture: &Harness,
) -> ServiceInstallHandler<
    crate::server::adapters::memory::InMemoryServiceRepository,
    crate::test_support::TestClock,
> {
    ServiceInstallHandler::new(Arc::clone(&fixture.services), Arc::clone(&fixture.clock))
}

#[tokio::test]
async fn successful_install_records_an_active_service() {
    let fixture = harness();
    let server_id = ServerId::new();
    let payload = ServiceInstallPayload {
        service: "redis".to_owned(),
        version: Some("7.4".to_owned()),
    };
    let job = install_job(
        &fixture,
        server_id,
        &payload,
        &JobOutcome::Completed {
            output: Some("installed".to_owned()),
            exit_code: Some(0),
        },
    );

    handler(&fixture).on_complete(&job).await.expect("handle");

    let service = fixture
        .services
        .find_by_name(server_id, "redis")
        .await
        .expect("lookup")
        .expect("service record");
    assert_eq!(service.status(), ServiceStatus::Active);
    assert_eq!(service.version(), Some("7.4"));
}

#[tokio::test]
async fn failed_install_records_the_error() {
    let fixture = harness();
    let server_id = ServerId::new();
    let payload = ServiceInstallPayload {
        service: "redis".to_owned(),
        version: None,
    };
    let job = install_job(
        &fixture,
        server_id,
        &payload,
        &JobOutcome::Failed {
            error: Some("package not found".to_owned()),
            exit_code: Some(100),
        },
    );

    handler(&fixture).on_complete(&job).await.expect("handle");

    let service = fixture
        .services
        .find_by_name(server_id, "redis")
        .await
        .expect("lookup")
        .expect("service record");
    assert_eq!(service.status(), ServiceStatus::Failed);
    assert_eq!(service.error(), Some("package not found"));
}

#[tokio::test]
async fn reinstall_updates_the_existing_record() {
    let fixture = harness();
    let server_id = ServerId::new();
    let failed = install_job(
        &fixture,
        server_id,
        &ServiceInstallPayload {
            service: "redis".to_owned(),
            version: None,
        },
        &JobOutcome::Failed {
            error: Some("mirror unreachable".to_owned()),
            exit_code: Some(1),
        },
    );
    handler(&fixture).on_complete(&failed).await.expect("first");

    let retried = install_job(
        &fixture,
        server_id,
        &ServiceInstallPayload {
            service: "redis".to_owned(),
            version: Some("7.4".to_owned()),
        },
        &JobOutcome::Completed {
            output: None,
            exit_code: Some(0),
        },
    );
    handler(&fixture).on_complete(&retried).await.expect("retry");

    let services = fixture
        .services
        .list_for_server(server_id)
        .await
        .expect("services");
    assert_eq!(services.len(), 1);
    let service = services.first().expect("record");
    assert_eq!(service.status(), ServiceStatus::Active);
    assert_eq!(service.error(), None);
}
