//! Web app creation tests: port reservation, job hand-off to the agent, and
//! activation or cleanup once the agent reports back.

use crate::in_memory::helpers::{BoxError, Stack, register_agent, report_job, runtime, stack};
use fleetward::apps::domain::{AppRuntime, ProcessStatus, WebAppStatus};
use fleetward::apps::ports::{ProcessRepository, WebAppRepository};
use fleetward::apps::services::{CREATE_WEBAPP_JOB_TYPE, CreateWebAppRequest};
use fleetward::protocol::dto::CompleteJobRequest;
use rstest::rstest;
use std::io;
use tokio::runtime::Runtime;

/// A node app reserves the lowest free port, hands the agent a creation job,
/// and goes live once the agent reports success.
#[rstest]
fn node_app_goes_live_after_agent_success(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, tenant_id, token) = register_agent(&rt, &stack, "apps-01")?;

    let app = rt.block_on(stack.web_apps.create(CreateWebAppRequest::new(
        server_id,
        tenant_id,
        "shop.example.com",
        "shop",
        AppRuntime::Node,
    )))?;
    assert_eq!(app.status(), WebAppStatus::Pending);
    assert_eq!(app.port(), Some(30000));

    let batch = rt.block_on(stack.gateway.fetch_jobs(&token))?;
    assert_eq!(batch.jobs.len(), 1);
    let job = batch.jobs.first().ok_or("creation job missing")?;
    assert_eq!(job.job_type, CREATE_WEBAPP_JOB_TYPE);
    assert_eq!(job.payload["domain"], "shop.example.com");
    assert_eq!(job.payload["port"], 30000);
    assert_eq!(job.payload["app_root"], "/home/shop/shop.example.com");

    report_job(
        &rt,
        &stack,
        &token,
        job,
        CompleteJobRequest {
            status: "completed".to_owned(),
            output: Some("created".to_owned()),
            error: None,
            exit_code: Some(0),
        },
    )?;

    let live = rt
        .block_on(stack.apps.find_by_id(app.id()))?
        .ok_or("app missing after completion")?;
    assert_eq!(live.status(), WebAppStatus::Active);

    let processes = rt.block_on(stack.processes.find_by_app(app.id()))?;
    assert_eq!(processes.len(), 1);
    assert!(
        processes
            .iter()
            .all(|process| process.status() == ProcessStatus::Running)
    );
    Ok(())
}

/// A failed remote creation marks the app failed, records the agent's error,
/// and releases the reserved port for the next app.
#[rstest]
fn failed_creation_releases_the_port(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, tenant_id, token) = register_agent(&rt, &stack, "apps-02")?;

    let app = rt.block_on(stack.web_apps.create(CreateWebAppRequest::new(
        server_id,
        tenant_id,
        "blog.example.com",
        "blog",
        AppRuntime::Node,
    )))?;
    assert_eq!(app.port(), Some(30000));

    let batch = rt.block_on(stack.gateway.fetch_jobs(&token))?;
    let job = batch.jobs.first().ok_or("creation job missing")?;
    report_job(
        &rt,
        &stack,
        &token,
        job,
        CompleteJobRequest {
            status: "failed".to_owned(),
            output: None,
            error: Some("useradd failed".to_owned()),
            exit_code: Some(1),
        },
    )?;

    let failed = rt
        .block_on(stack.apps.find_by_id(app.id()))?
        .ok_or("app missing after failure")?;
    assert_eq!(failed.status(), WebAppStatus::Failed);
    assert_eq!(failed.error(), Some("useradd failed"));
    assert!(rt.block_on(stack.processes.find_by_app(app.id()))?.is_empty());

    // The reservation is gone, so the next node app gets the same port.
    let replacement = rt.block_on(stack.web_apps.create(CreateWebAppRequest::new(
        server_id,
        tenant_id,
        "blog2.example.com",
        "blog2",
        AppRuntime::Node,
    )))?;
    assert_eq!(replacement.port(), Some(30000));
    Ok(())
}

/// A PHP app runs through the web server and needs neither a port nor a
/// supervised process.
#[rstest]
fn php_app_needs_no_port(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, tenant_id, token) = register_agent(&rt, &stack, "apps-03")?;

    let app = rt.block_on(stack.web_apps.create(CreateWebAppRequest::new(
        server_id,
        tenant_id,
        "legacy.example.com",
        "legacy",
        AppRuntime::Php,
    )))?;
    assert_eq!(app.port(), None);
    assert!(rt.block_on(stack.processes.find_by_app(app.id()))?.is_empty());

    let batch = rt.block_on(stack.gateway.fetch_jobs(&token))?;
    let job = batch.jobs.first().ok_or("creation job missing")?;
    assert!(job.payload["port"].is_null());
    assert_eq!(job.payload["runtime"], "php");
    Ok(())
}
