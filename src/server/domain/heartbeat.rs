//! Heartbeat report values observed from a managed server's agent.

use serde::{Deserialize, Serialize};

/// Hardware and operating-system facts observed by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpecs {
    /// Operating system description, e.g. `Ubuntu 24.04`.
    pub os: Option<String>,
    /// Number of CPU cores.
    pub cpu_cores: Option<i32>,
    /// Total memory in megabytes.
    pub memory_mb: Option<i64>,
    /// Total disk in gigabytes.
    pub disk_gb: Option<i64>,
}

impl ServerSpecs {
    /// Returns `true` when no fact is populated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.os.is_none()
            && self.cpu_cores.is_none()
            && self.memory_mb.is_none()
            && self.disk_gb.is_none()
    }
}

/// Observed status of one managed service (web server, database, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceObservation {
    /// Service name as the agent reports it, e.g. `nginx`.
    pub name: String,
    /// Observed status string, e.g. `running` or `stopped`.
    pub status: String,
    /// Installed version when the agent can determine it.
    pub version: Option<String>,
}

/// Observed status of one supervised daemon process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonObservation {
    /// Daemon name as registered with the supervisor.
    pub name: String,
    /// Whether the supervisor reports the daemon running.
    pub running: bool,
}

/// Resource utilisation percentages sampled by the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// CPU utilisation percentage.
    pub cpu_pct: Option<f32>,
    /// Memory utilisation percentage.
    pub memory_pct: Option<f32>,
    /// Disk utilisation percentage.
    pub disk_pct: Option<f32>,
}

impl ResourceSample {
    /// Returns `true` when no percentage is populated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cpu_pct.is_none() && self.memory_pct.is_none() && self.disk_pct.is_none()
    }
}

/// One periodic agent report.
///
/// Every field is optional: agents send whatever they can observe, and the
/// reconciler treats absence as "no new information", never as a reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatReport {
    /// Hardware and OS facts, when re-observed.
    pub specs: Option<ServerSpecs>,
    /// Per-service observed statuses.
    pub services_status: Vec<ServiceObservation>,
    /// Per-daemon observed statuses.
    pub daemons_status: Vec<DaemonObservation>,
    /// Observed command-line tool versions keyed by tool name.
    pub tools_status: Vec<ServiceObservation>,
    /// Free-text database health summary, when the agent probes it.
    pub database_health: Option<String>,
    /// Resource utilisation sample.
    pub resources: ResourceSample,
}

impl HeartbeatReport {
    /// Returns `true` when the report carries any per-service status.
    #[must_use]
    pub fn has_service_statuses(&self) -> bool {
        !self.services_status.is_empty()
    }
}
