//! Full provisioning lifecycle tests: pending server, provision callback,
//! bootstrap fan-out on first contact, and agent-driven step completion.

use crate::in_memory::helpers::{
    BoxError, Stack, drain_jobs, register_agent, report_job, runtime, stack,
};
use fleetward::events::DomainEvent;
use fleetward::protocol::ProtocolError;
use fleetward::protocol::dto::{CompleteJobRequest, HeartbeatRequest, ProvisionCallbackRequest};
use fleetward::server::domain::{
    ProvisioningPhase, ServerStatus, ServiceStatus, StackSelection, StepStatus, TenantId,
};
use fleetward::server::ports::{ProvisioningStepRepository, ServerRepository, ServiceRepository};
use fleetward::server::services::CreateServerRequest;
use rstest::rstest;
use std::io;
use tokio::runtime::Runtime;

/// Walks a fresh server through callback, bootstrap, and completion of every
/// catalog job, asserting the phase and service ledger at each stage.
#[rstest]
fn default_stack_provisions_end_to_end(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, _tenant_id, token) = register_agent(&rt, &stack, "web-01")?;

    let registered = rt
        .block_on(stack.servers.find_by_id(server_id))?
        .ok_or("server missing after callback")?;
    assert_eq!(registered.status(), ServerStatus::Provisioning);
    assert_eq!(registered.phase(), ProvisioningPhase::Bootstrap);

    // First contact fans the default stack out into steps and queued jobs.
    let heartbeat = rt.block_on(stack.gateway.heartbeat(&token, HeartbeatRequest::default()))?;
    assert_eq!(heartbeat.status, "ok");
    let steps = rt.block_on(stack.steps.list_for_server(server_id))?;
    assert_eq!(steps.len(), 8);
    assert!(steps.iter().all(|step| step.status() == StepStatus::Queued));
    let fanned_out = rt
        .block_on(stack.servers.find_by_id(server_id))?
        .ok_or("server missing after heartbeat")?;
    assert_eq!(fanned_out.phase(), ProvisioningPhase::Installing);
    assert_eq!(fanned_out.status(), ServerStatus::Active);

    // The agent polls, runs, and reports every job as completed.
    let drained = drain_jobs(&rt, &stack, &token, "completed")?;
    assert_eq!(drained.len(), 8);
    assert!(drained.iter().any(|job| job.job_type == "provision_nginx"));

    let provisioned = rt
        .block_on(stack.servers.find_by_id(server_id))?
        .ok_or("server missing after completion")?;
    assert_eq!(provisioned.phase(), ProvisioningPhase::Completed);

    let services = rt.block_on(stack.services.list_for_server(server_id))?;
    let names: Vec<&str> = services.iter().map(|service| service.name()).collect();
    assert!(names.contains(&"nginx"));
    assert!(names.contains(&"php"));
    assert!(!names.contains(&"firewall"));
    assert!(
        services
            .iter()
            .all(|service| service.status() == ServiceStatus::Active)
    );

    let completions = stack
        .events
        .snapshot()
        .iter()
        .filter(|event| matches!(event, DomainEvent::ProvisioningCompleted { .. }))
        .count();
    assert_eq!(completions, 1);
    Ok(())
}

/// A failed required step stalls the install instead of finishing it.
#[rstest]
fn required_step_failure_stalls_the_install(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, _tenant_id, token) = register_agent(&rt, &stack, "web-02")?;
    rt.block_on(stack.gateway.heartbeat(&token, HeartbeatRequest::default()))?;

    let batch = rt.block_on(stack.gateway.fetch_jobs(&token))?;
    for job in &batch.jobs {
        if job.job_type == "provision_nginx" {
            report_job(
                &rt,
                &stack,
                &token,
                job,
                CompleteJobRequest {
                    status: "failed".to_owned(),
                    output: None,
                    error: Some("apt exited 100".to_owned()),
                    exit_code: Some(100),
                },
            )?;
        } else {
            report_job(
                &rt,
                &stack,
                &token,
                job,
                CompleteJobRequest {
                    status: "completed".to_owned(),
                    output: Some("ok".to_owned()),
                    error: None,
                    exit_code: Some(0),
                },
            )?;
        }
    }

    let server = rt
        .block_on(stack.servers.find_by_id(server_id))?
        .ok_or("server missing")?;
    assert_eq!(server.phase(), ProvisioningPhase::Installing);

    let stalls: Vec<DomainEvent> = stack
        .events
        .snapshot()
        .into_iter()
        .filter(|event| matches!(event, DomainEvent::ProvisioningStalled { .. }))
        .collect();
    assert_eq!(stalls.len(), 1);
    if let Some(DomainEvent::ProvisioningStalled { step_type, .. }) = stalls.first() {
        assert_eq!(step_type, "provision_nginx");
    }
    Ok(())
}

/// The provision token registers exactly one agent.
#[rstest]
fn provision_token_is_single_use(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let tenant_id = TenantId::new();
    let created = rt.block_on(stack.registration.create_server(CreateServerRequest::new(
        tenant_id,
        "web-03",
        StackSelection::default(),
    )))?;

    let first = rt.block_on(
        stack
            .gateway
            .provision_callback(&created.provision_token, ProvisionCallbackRequest::default()),
    )?;
    assert_eq!(first.status, "registered");

    let second = rt.block_on(
        stack
            .gateway
            .provision_callback(&created.provision_token, ProvisionCallbackRequest::default()),
    );
    assert!(matches!(second, Err(ProtocolError::UnknownToken)));
    Ok(())
}

/// Every authenticated operation rejects an unknown bearer token without
/// touching any state.
#[rstest]
fn unknown_bearer_token_is_rejected(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;

    let heartbeat = rt.block_on(
        stack
            .gateway
            .heartbeat("not-a-token", HeartbeatRequest::default()),
    );
    assert!(matches!(heartbeat, Err(ProtocolError::Unauthorized)));

    let jobs = rt.block_on(stack.gateway.fetch_jobs("not-a-token"));
    assert!(matches!(jobs, Err(ProtocolError::Unauthorized)));
    Ok(())
}
