use crate::job::domain::{Job, JobOutcome};
use crate::protocol::dto::{CompleteJobRequest, HeartbeatRequest, JobDto};
use crate::server::domain::{HeartbeatReport, TenantId};
use crate::test_support::TestClock;
use serde_json::json;

#[test]
fn heartbeat_request_with_specs_becomes_a_specced_report() {
    let request: HeartbeatRequest = serde_json::from_value(json!({
        "os": "Ubuntu 24.04",
        "cpu_cores": 4,
        "services_status": [
            { "name": "nginx", "status": "running", "version": "1.27" }
        ],
        "cpu_usage": 12.5
    }))
    .expect("deserialize");

    let report = HeartbeatReport::from(request);
    let specs = report.specs.expect("specs");
    assert_eq!(specs.os.as_deref(), Some("Ubuntu 24.04"));
    assert_eq!(specs.cpu_cores, Some(4));
    assert_eq!(report.services_status.len(), 1);
    assert_eq!(report.resources.cpu_pct, Some(12.5));
    assert!(report.resources.memory_pct.is_none());
}

#[test]
fn heartbeat_request_keeps_daemon_tool_and_database_sections() {
    let request: HeartbeatRequest = serde_json::from_value(json!({
        "daemons_status": [
            { "name": "shop.example.com-node", "running": true }
        ],
        "tools_status": [
            { "name": "composer", "status": "installed", "version": "2.7.1" }
        ],
        "database_health": "all reachable"
    }))
    .expect("deserialize");

    let report = HeartbeatReport::from(request);
    let daemon = report.daemons_status.first().expect("daemon");
    assert_eq!(daemon.name, "shop.example.com-node");
    assert!(daemon.running);
    let tool = report.tools_status.first().expect("tool");
    assert_eq!(tool.name, "composer");
    assert_eq!(tool.version.as_deref(), Some("2.7.1"));
    assert_eq!(report.database_health.as_deref(), Some("all reachable"));
}

#[test]
fn empty_heartbeat_request_carries_no_specs() {
    let request: HeartbeatRequest = serde_json::from_value(json!({})).expect("deserialize");
    let report = HeartbeatReport::from(request);
    assert!(report.specs.is_none());
    assert!(!report.has_service_statuses());
    assert!(report.resources.is_empty());
}

#[test]
fn job_dto_serializes_the_type_tag() {
    let clock = TestClock::fixed();
    let job = Job::new(
        crate::server::domain::ServerId::new(),
        TenantId::new(),
        "provision_nginx",
        json!({ "step_type": "provision_nginx" }),
        5,
        3,
        clock.now(),
    );
    let dto = JobDto::from(&job);
    let wire = serde_json::to_value(&dto).expect("serialize");
    assert_eq!(wire.get("type"), Some(&json!("provision_nginx")));
    assert!(wire.get("job_type").is_none());
}

#[test]
fn completion_reports_map_to_outcomes() {
    let completed = CompleteJobRequest {
        status: " Completed ".to_owned(),
        output: Some("ok".to_owned()),
        error: None,
        exit_code: Some(0),
    };
    assert!(matches!(
        completed.into_outcome(),
        Ok(JobOutcome::Completed {
            output: Some(output),
            exit_code: Some(0),
        }) if output == "ok"
    ));

    let failed = CompleteJobRequest {
        status: "failed".to_owned(),
        output: None,
        error: Some("boom".to_owned()),
        exit_code: Some(2),
    };
    assert!(matches!(
        failed.into_outcome(),
        Ok(JobOutcome::Failed { error: Some(error), .. }) if error == "boom"
    ));

    let bogus = CompleteJobRequest {
        status: "exploded".to_owned(),
        output: None,
        error: None,
        exit_code: None,
    };
    assert_eq!(bogus.into_outcome(), Err("exploded".to_owned()));
}
