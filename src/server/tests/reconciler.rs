use super::{Harness, harness, registered_server};
use crate::events::DomainEvent;
use crate::job::ports::JobRepository;
use crate::server::domain::{
    DaemonObservation, HeartbeatReport, PersistedServerData, ProvisioningPhase, ResourceSample,
    Server, ServerId, ServerSpecs, ServerStatus, ServiceObservation, ServiceStatus, StackSelection,
    TenantId,
};
use crate::server::ports::{ServerRepository, ServiceRepository};
use crate::server::services::ReconcileError;
use std::collections::BTreeMap;

fn observation(name: &str, status: &str) -> ServiceObservation {
    ServiceObservation {
        name: name.to_owned(),
        status: status.to_owned(),
        version: None,
    }
}

/// A server registered before provisioning phases existed: already active,
/// no phase history, no steps.
async fn legacy_server(fixture: &Harness) -> Server {
    let now = fixture.clock.now();
    let server = Server::from_persisted(PersistedServerData {
        id: ServerId::new(),
        tenant_id: TenantId::new(),
        name: "legacy-01".to_owned(),
        status: ServerStatus::Provisioning,
        phase: ProvisioningPhase::Completed,
        stack: StackSelection::default(),
        provision_token_digest: None,
        provision_token_expires_at: None,
        agent_token_digest: Some("legacy-digest".to_owned()),
        ip_address: None,
        public_key: None,
        specs: None,
        services_status: BTreeMap::new(),
        daemons_status: BTreeMap::new(),
        tools_status: BTreeMap::new(),
        database_health: None,
        last_heartbeat_at: None,
        created_at: now,
        updated_at: now,
    });
    fixture.servers.insert(&server).await.expect("insert");
    server
}

#[tokio::test]
async fn first_heartbeat_triggers_the_bootstrap_fan_out() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    let report = HeartbeatReport {
        services_status: vec![observation("nginx", "running")],
        ..HeartbeatReport::default()
    };
    let reconciled = fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("ingest");

    assert_eq!(reconciled.status(), ServerStatus::Active);
    assert_eq!(reconciled.phase(), ProvisioningPhase::Installing);
    assert_eq!(
        fixture
            .jobs
            .list_for_server(server.id())
            .await
            .expect("jobs")
            .len(),
        8
    );
    // Bootstrap wins: the reported nginx status is observed on the server
    // but not synced into service records ahead of the catalog.
    assert!(
        fixture
            .services
            .list_for_server(server.id())
            .await
            .expect("services")
            .is_empty()
    );
    assert_eq!(
        reconciled.services_status().get("nginx").map(String::as_str),
        Some("running")
    );
}

#[tokio::test]
async fn later_heartbeats_do_not_fan_out_again() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    let report = HeartbeatReport::default();
    fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("first ingest");
    fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("second ingest");

    assert_eq!(
        fixture
            .jobs
            .list_for_server(server.id())
            .await
            .expect("jobs")
            .len(),
        8
    );
}

#[tokio::test]
async fn legacy_first_contact_resyncs_services_from_the_report() {
    let fixture = harness();
    let server = legacy_server(&fixture).await;

    let report = HeartbeatReport {
        services_status: vec![
            observation("nginx", "running"),
            observation("mysql", "stopped"),
        ],
        ..HeartbeatReport::default()
    };
    fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("ingest");

    let services = fixture
        .services
        .list_for_server(server.id())
        .await
        .expect("services");
    assert_eq!(services.len(), 2);
    let mysql = services
        .iter()
        .find(|service| service.name() == "mysql")
        .expect("mysql record");
    assert_eq!(mysql.status(), ServiceStatus::Failed);
    let nginx = services
        .iter()
        .find(|service| service.name() == "nginx")
        .expect("nginx record");
    assert_eq!(nginx.status(), ServiceStatus::Active);
}

#[tokio::test]
async fn status_changes_are_published_once_per_transition() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    fixture
        .reconciler
        .ingest(server.id(), &HeartbeatReport::default())
        .await
        .expect("first ingest");
    fixture
        .reconciler
        .ingest(server.id(), &HeartbeatReport::default())
        .await
        .expect("second ingest");

    let transitions: Vec<_> = fixture
        .events
        .snapshot()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                DomainEvent::ServerStatusChanged {
                    current: ServerStatus::Active,
                    ..
                }
            )
        })
        .collect();
    // Provisioning -> Active fires once; the second heartbeat is a no-op.
    assert_eq!(transitions.len(), 1);
}

#[tokio::test]
async fn resource_samples_are_appended() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    let report = HeartbeatReport {
        resources: ResourceSample {
            cpu_pct: Some(41.5),
            memory_pct: Some(63.0),
            disk_pct: None,
        },
        ..HeartbeatReport::default()
    };
    fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("ingest");
    // A report without a sample records nothing.
    fixture
        .reconciler
        .ingest(server.id(), &HeartbeatReport::default())
        .await
        .expect("empty ingest");

    let samples = fixture.metrics.snapshot().expect("snapshot");
    assert_eq!(samples.len(), 1);
    let sample = samples.first().expect("sample");
    assert_eq!(sample.server_id, server.id());
    assert_eq!(sample.sample.cpu_pct, Some(41.5));
}

#[tokio::test]
async fn observed_specs_update_the_server() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    let report = HeartbeatReport {
        specs: Some(ServerSpecs {
            os: Some("Ubuntu 24.04".to_owned()),
            cpu_cores: Some(8),
            memory_mb: Some(16384),
            disk_gb: Some(320),
        }),
        ..HeartbeatReport::default()
    };
    let reconciled = fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("ingest");
    assert_eq!(
        reconciled.specs().and_then(|specs| specs.cpu_cores),
        Some(8)
    );
}

#[tokio::test]
async fn daemon_tool_and_database_observations_update_the_server() {
    let fixture = harness();
    let (server, _token) = registered_server(&fixture).await;

    let report = HeartbeatReport {
        daemons_status: vec![
            DaemonObservation {
                name: "shop.example.com-node".to_owned(),
                running: true,
            },
            DaemonObservation {
                name: "queue-worker".to_owned(),
                running: false,
            },
        ],
        tools_status: vec![
            ServiceObservation {
                name: "composer".to_owned(),
                status: "installed".to_owned(),
                version: Some("2.7.1".to_owned()),
            },
            ServiceObservation {
                name: "node".to_owned(),
                status: "missing".to_owned(),
                version: None,
            },
        ],
        database_health: Some("1 database, all reachable".to_owned()),
        ..HeartbeatReport::default()
    };
    let reconciled = fixture
        .reconciler
        .ingest(server.id(), &report)
        .await
        .expect("ingest");

    assert_eq!(
        reconciled.daemons_status().get("shop.example.com-node"),
        Some(&"running".to_owned())
    );
    assert_eq!(
        reconciled.daemons_status().get("queue-worker"),
        Some(&"stopped".to_owned())
    );
    assert_eq!(
        reconciled.tools_status().get("composer"),
        Some(&"2.7.1".to_owned())
    );
    // Tools without a readable version keep the raw status string.
    assert_eq!(
        reconciled.tools_status().get("node"),
        Some(&"missing".to_owned())
    );
    assert_eq!(
        reconciled.database_health(),
        Some("1 database, all reachable")
    );

    // A later report without these sections leaves the ledgers alone.
    let reconciled = fixture
        .reconciler
        .ingest(server.id(), &HeartbeatReport::default())
        .await
        .expect("empty ingest");
    assert_eq!(
        reconciled.daemons_status().get("queue-worker"),
        Some(&"stopped".to_owned())
    );
    assert_eq!(
        reconciled.database_health(),
        Some("1 database, all reachable")
    );
}

#[tokio::test]
async fn reports_from_unknown_servers_are_rejected() {
    let fixture = harness();
    let err = fixture
        .reconciler
        .ingest(ServerId::new(), &HeartbeatReport::default())
        .await
        .expect_err("unknown server");
    assert!(matches!(err, ReconcileError::UnknownServer(_)));
}
