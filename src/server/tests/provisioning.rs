use super::{Harness, harness, registered_server};
use crate::events::DomainEvent;
use crate::job::domain::{Job, JobId, JobOutcome};
use crate::job::ports::JobRepository;
use crate::server::domain::{ProvisioningPhase, ServiceStatus, StepStatus};
use crate::server::ports::{ProvisioningStepRepository, ServerRepository, ServiceRepository};

async fn finished_job(fixture: &Harness, job_id: JobId, outcome: &JobOutcome) -> Job {
    let mut job = fixture
        .jobs
        .find_by_id(job_id)
        .await
        .expect("lookup")
        .expect("step job");
    job.claim(fixture.clock.now()).expect("claim");
    job.finish(outcome, fixture.clock.now()).expect("finish");
    fixture.jobs.update(&job).await.expect("persist");
    job
}

fn completed() -> JobOutcome {
    JobOutcome::Completed {
        output: Some("done".to_owned()),
        exit_code: Some(0),
    }
}

#[tokio::test]
async fn bootstrap_fans_the_catalog_out_into_steps_and_jobs() {
    let fixture = harness();
    let (mut server, _token) = registered_server(&fixture).await;

    let steps = fixture
        .provisioning
        .begin_bootstrap(&mut server)
        .await
        .expect("bootstrap");

    assert_eq!(steps.len(), 8);
    assert_eq!(server.phase(), ProvisioningPhase::Installing);
    assert!(steps.iter().all(|step| step.status() == StepStatus::Queued));

    let jobs = fixture
        .jobs
        .list_for_server(server.id())
        .await
        .expect("jobs");
    assert_eq!(jobs.len(), 8);
    // Each step links to exactly the job carrying its step type.
    for step in &steps {
        let job_id = step.job_id().expect("linked job");
        let job = jobs.iter().find(|job| job.id() == job_id).expect("job");
        assert_eq!(job.job_type(), step.step_type());
    }
}

#[tokio::test]
async fn completing_every_required_step_finishes_the_phase() {
    let fixture = harness();
    let (mut server, _token) = registered_server(&fixture).await;
    let steps = fixture
        .provisioning
        .begin_bootstrap(&mut server)
        .await
        .expect("bootstrap");
    fixture.servers.update(&server).await.expect("persist");

    for step in &steps {
        let job = finished_job(&fixture, step.job_id().expect("job"), &completed()).await;
        fixture
            .provisioning
            .record_step_outcome(&job)
            .await
            .expect("record");
    }

    let stored = fixture
        .servers
        .find_by_id(server.id())
        .await
        .expect("lookup")
        .expect("server");
    assert_eq!(stored.phase(), ProvisioningPhase::Completed);

    let stored_steps = fixture
        .steps
        .list_for_server(server.id())
        .await
        .expect("steps");
    assert!(stored_steps.iter().all(|step| step.status() == StepStatus::Completed));

    // provision_* steps leave installed-service records; system_update and
    // provision_firewall do not.
    let services = fixture
        .services
        .list_for_server(server.id())
        .await
        .expect("services");
    let names: Vec<&str> = services.iter().map(|service| service.name()).collect();
    assert!(names.contains(&"nginx"));
    assert!(names.contains(&"php"));
    assert!(!names.contains(&"firewall"));
    assert!(services.iter().all(|service| service.status() == ServiceStatus::Active));

    assert!(fixture.events.snapshot().iter().any(|event| matches!(
        event,
        DomainEvent::ProvisioningCompleted { server_id, .. } if *server_id == server.id()
    )));
}

#[tokio::test]
async fn a_required_failure_stalls_the_phase() {
    let fixture = harness();
    let (mut server, _token) = registered_server(&fixture).await;
    let steps = fixture
        .provisioning
        .begin_bootstrap(&mut server)
        .await
        .expect("bootstrap");
    fixture.servers.update(&server).await.expect("persist");

    let nginx = steps
        .iter()
        .find(|step| step.step_type() == "provision_nginx")
        .expect("nginx step");
    let job = finished_job(
        &fixture,
        nginx.job_id().expect("job"),
        &JobOutcome::Failed {
            error: Some("apt exited 100".to_owned()),
            exit_code: Some(100),
        },
    )
    .await;
    fixture
        .provisioning
        .record_step_outcome(&job)
        .await
        .expect("record");

    let stored = fixture
        .servers
        .find_by_id(server.id())
        .await
        .expect("lookup")
        .expect("server");
    assert_eq!(stored.phase(), ProvisioningPhase::Installing);

    let stalls: Vec<_> = fixture
        .events
        .snapshot()
        .into_iter()
        .filter(|event| matches!(event, DomainEvent::ProvisioningStalled { .. }))
        .collect();
    assert_eq!(stalls.len(), 1);
    assert!(matches!(
        stalls.first(),
        Some(DomainEvent::ProvisioningStalled { step_type, error, .. })
            if step_type == "provision_nginx" && error.as_deref() == Some("apt exited 100")
    ));
}

#[tokio::test]
async fn an_optional_failure_does_not_block_completion() {
    let fixture = harness();
    let (mut server, _token) = registered_server(&fixture).await;
    let steps = fixture
        .provisioning
        .begin_bootstrap(&mut server)
        .await
        .expect("bootstrap");
    fixture.servers.update(&server).await.expect("persist");

    for step in &steps {
        let outcome = if step.step_type() == "provision_redis" {
            JobOutcome::Failed {
                error: Some("mirror unreachable".to_owned()),
                exit_code: Some(1),
            }
        } else {
            completed()
        };
        let job = finished_job(&fixture, step.job_id().expect("job"), &outcome).await;
        fixture
            .provisioning
            .record_step_outcome(&job)
            .await
            .expect("record");
    }

    let stored = fixture
        .servers
        .find_by_id(server.id())
        .await
        .expect("lookup")
        .expect("server");
    assert_eq!(stored.phase(), ProvisioningPhase::Completed);
    assert!(
        fixture
            .events
            .snapshot()
            .iter()
            .all(|event| !matches!(event, DomainEvent::ProvisioningStalled { .. }))
    );
}

#[tokio::test]
async fn an_outcome_for_an_unlinked_job_is_ignored() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    let mut job = Job::new(
        server.id(),
        server.tenant_id(),
        "provision_nginx",
        serde_json::json!({}),
        5,
        3,
        fixture.clock.now(),
    );
    job.claim(fixture.clock.now()).expect("claim");
    job.finish(&completed(), fixture.clock.now()).expect("finish");

    fixture
        .provisioning
        .record_step_outcome(&job)
        .await
        .expect("no step, no-op");
}
