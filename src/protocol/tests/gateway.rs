use super::{harness, registered_agent};
use crate::firewall::domain::{Direction, PortSpec, RuleAction, RuleSource};
use crate::firewall::services::ApplyRuleRequest;
use crate::job::domain::JobId;
use crate::job::services::EnqueueJobRequest;
use crate::protocol::dto::{CompleteJobRequest, HeartbeatRequest, ProvisionCallbackRequest};
use crate::protocol::{FETCH_JOB_LIMIT, ProtocolError};
use crate::server::domain::TenantId;

fn completion(status: &str) -> CompleteJobRequest {
    CompleteJobRequest {
        status: status.to_owned(),
        output: Some("done".to_owned()),
        error: None,
        exit_code: Some(0),
    }
}

#[tokio::test]
async fn every_operation_rejects_an_unknown_bearer_token() {
    let fixture = harness();
    registered_agent(&fixture).await;

    let err = fixture
        .gateway
        .heartbeat("bogus", HeartbeatRequest::default())
        .await
        .expect_err("heartbeat");
    assert!(matches!(err, ProtocolError::Unauthorized));

    let err = fixture
        .gateway
        .fetch_jobs("bogus")
        .await
        .expect_err("fetch");
    assert!(matches!(err, ProtocolError::Unauthorized));

    let err = fixture
        .gateway
        .complete_job("bogus", JobId::new(), completion("completed"))
        .await
        .expect_err("complete");
    assert!(matches!(err, ProtocolError::Unauthorized));
}

#[tokio::test]
async fn heartbeat_answers_with_server_and_time() {
    let fixture = harness();
    let (server_id, _tenant, token) = registered_agent(&fixture).await;

    let response = fixture
        .gateway
        .heartbeat(&token, HeartbeatRequest::default())
        .await
        .expect("heartbeat");
    assert_eq!(response.status, "ok");
    assert_eq!(response.server_id, server_id);
    assert_eq!(response.time, fixture.clock.now());
}

#[tokio::test]
async fn fetch_claims_at_most_the_poll_limit() {
    let fixture = harness();
    let (server_id, tenant_id, token) = registered_agent(&fixture).await;
    // The first heartbeat fans out 8 bootstrap jobs; add enough of our own
    // to exceed one poll.
    fixture
        .gateway
        .heartbeat(&token, HeartbeatRequest::default())
        .await
        .expect("heartbeat");
    for index in 0..4 {
        fixture
            .queue
            .enqueue(EnqueueJobRequest::new(
                server_id,
                tenant_id,
                "service_install",
                serde_json::json!({ "service": format!("extra-{index}") }),
            ))
            .await
            .expect("enqueue");
    }

    let first = fixture.gateway.fetch_jobs(&token).await.expect("first poll");
    assert_eq!(first.count, FETCH_JOB_LIMIT);
    assert_eq!(first.jobs.len(), FETCH_JOB_LIMIT);

    let second = fixture
        .gateway
        .fetch_jobs(&token)
        .await
        .expect("second poll");
    assert_eq!(second.count, 2);

    // Claims are exclusive; nothing is handed out twice.
    let third = fixture.gateway.fetch_jobs(&token).await.expect("third poll");
    assert_eq!(third.count, 0);
}

#[tokio::test]
async fn completion_is_scoped_to_the_owning_server() {
    let fixture = harness();
    let (_server, _tenant, owner_token) = registered_agent(&fixture).await;
    let (_other_server, _other_tenant, other_token) = registered_agent(&fixture).await;

    fixture
        .gateway
        .heartbeat(&owner_token, HeartbeatRequest::default())
        .await
        .expect("heartbeat");
    let claimed = fixture
        .gateway
        .fetch_jobs(&owner_token)
        .await
        .expect("fetch");
    let job = claimed.jobs.first().expect("claimed job");

    // Another server's agent sees a job it does not own as nonexistent.
    let err = fixture
        .gateway
        .complete_job(&other_token, job.id, completion("completed"))
        .await
        .expect_err("foreign completion");
    assert!(matches!(err, ProtocolError::JobNotOwned(id) if id == job.id));

    fixture
        .gateway
        .complete_job(&owner_token, job.id, completion("completed"))
        .await
        .expect("owner completion");

    // A duplicate report conflicts rather than overwriting.
    let err = fixture
        .gateway
        .complete_job(&owner_token, job.id, completion("failed"))
        .await
        .expect_err("duplicate completion");
    assert!(matches!(err, ProtocolError::CompletionConflict(id) if id == job.id));
}

#[tokio::test]
async fn malformed_completion_status_is_rejected_up_front() {
    let fixture = harness();
    let (_server, _tenant, token) = registered_agent(&fixture).await;
    let err = fixture
        .gateway
        .complete_job(&token, JobId::new(), completion("exploded"))
        .await
        .expect_err("bad status");
    assert!(matches!(
        err,
        ProtocolError::InvalidCompletionStatus(status) if status == "exploded"
    ));
}

#[tokio::test]
async fn provision_callback_is_one_time() {
    let fixture = harness();
    let created = fixture
        .registration
        .create_server(crate::server::services::CreateServerRequest::new(
            TenantId::new(),
            "web-02",
            crate::server::domain::StackSelection::default(),
        ))
        .await
        .expect("create server");

    let response = fixture
        .gateway
        .provision_callback(&created.provision_token, ProvisionCallbackRequest::default())
        .await
        .expect("first callback");
    assert_eq!(response.status, "registered");

    let err = fixture
        .gateway
        .provision_callback(&created.provision_token, ProvisionCallbackRequest::default())
        .await
        .expect_err("token consumed");
    assert!(matches!(err, ProtocolError::UnknownToken));
}

#[tokio::test]
async fn firewall_confirmation_round_trips_through_the_gateway() {
    let fixture = harness();
    let (server_id, tenant_id, _token) = registered_agent(&fixture).await;

    let applied = fixture
        .firewall
        .apply(
            ApplyRuleRequest::new(server_id, tenant_id, Direction::Inbound, RuleAction::Deny)
                .with_port_spec(PortSpec::Single(22))
                .with_source(RuleSource::Any),
        )
        .await
        .expect("apply");
    let ticket = applied.confirmation.expect("ticket");

    let response = fixture
        .gateway
        .confirm_firewall(&ticket.token)
        .await
        .expect("confirm");
    assert_eq!(response.status, "confirmed");
    assert_eq!(response.rule_id, applied.rule.id());

    let err = fixture
        .gateway
        .confirm_firewall(&ticket.token)
        .await
        .expect_err("token resolved");
    assert!(matches!(err, ProtocolError::UnknownToken));
}
