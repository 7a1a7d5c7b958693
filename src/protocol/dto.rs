//! Wire types for the agent-facing HTTP protocol.
//!
//! Every request field is optional where the agent may not be able to
//! observe it; absence means "no new information".

use crate::job::domain::{Job, JobId, JobOutcome};
use crate::server::domain::{
    DaemonObservation, HeartbeatReport, ResourceSample, ServerId, ServerSpecs, ServiceObservation,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reported service status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusDto {
    /// Service name as the agent reports it.
    pub name: String,
    /// Observed status string.
    pub status: String,
    /// Installed version, when the agent can determine it.
    #[serde(default)]
    pub version: Option<String>,
}

impl From<ServiceStatusDto> for ServiceObservation {
    fn from(dto: ServiceStatusDto) -> Self {
        Self {
            name: dto.name,
            status: dto.status,
            version: dto.version,
        }
    }
}

/// One reported supervised daemon status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatusDto {
    /// Daemon name as registered with the supervisor.
    pub name: String,
    /// Whether the supervisor reports it running.
    pub running: bool,
}

impl From<DaemonStatusDto> for DaemonObservation {
    fn from(dto: DaemonStatusDto) -> Self {
        Self {
            name: dto.name,
            running: dto.running,
        }
    }
}

/// `POST /heartbeat` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Operating system description.
    #[serde(default)]
    pub os: Option<String>,
    /// Number of CPU cores.
    #[serde(default)]
    pub cpu_cores: Option<i32>,
    /// Total memory in megabytes.
    #[serde(default)]
    pub memory_mb: Option<i64>,
    /// Total disk in gigabytes.
    #[serde(default)]
    pub disk_gb: Option<i64>,
    /// Per-service observed statuses.
    #[serde(default)]
    pub services_status: Vec<ServiceStatusDto>,
    /// Per-daemon observed statuses.
    #[serde(default)]
    pub daemons_status: Vec<DaemonStatusDto>,
    /// Observed command-line tool versions.
    #[serde(default)]
    pub tools_status: Vec<ServiceStatusDto>,
    /// Free-text database health summary.
    #[serde(default)]
    pub database_health: Option<String>,
    /// CPU utilisation percentage.
    #[serde(default)]
    pub cpu_usage: Option<f32>,
    /// Memory utilisation percentage.
    #[serde(default)]
    pub memory_usage: Option<f32>,
    /// Disk utilisation percentage.
    #[serde(default)]
    pub disk_usage: Option<f32>,
}

impl From<HeartbeatRequest> for HeartbeatReport {
    fn from(request: HeartbeatRequest) -> Self {
        let specs = ServerSpecs {
            os: request.os,
            cpu_cores: request.cpu_cores,
            memory_mb: request.memory_mb,
            disk_gb: request.disk_gb,
        };
        Self {
            specs: if specs.is_empty() { None } else { Some(specs) },
            services_status: request
                .services_status
                .into_iter()
                .map(Into::into)
                .collect(),
            daemons_status: request.daemons_status.into_iter().map(Into::into).collect(),
            tools_status: request.tools_status.into_iter().map(Into::into).collect(),
            database_health: request.database_health,
            resources: ResourceSample {
                cpu_pct: request.cpu_usage,
                memory_pct: request.memory_usage,
                disk_pct: request.disk_usage,
            },
        }
    }
}

/// `POST /heartbeat` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    /// Always `ok` on success.
    pub status: String,
    /// The authenticated server.
    pub server_id: ServerId,
    /// Control-plane time when the report was processed.
    pub time: DateTime<Utc>,
}

/// One claimed job as sent to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDto {
    /// Job identifier.
    pub id: JobId,
    /// Job type tag.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Type-keyed command payload.
    pub payload: Value,
    /// Priority, lower is more urgent.
    pub priority: i16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&Job> for JobDto {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id(),
            job_type: job.job_type().to_owned(),
            payload: job.payload().clone(),
            priority: job.priority(),
            created_at: job.created_at(),
        }
    }
}

/// `GET /jobs` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    /// Jobs claimed for this poll.
    pub jobs: Vec<JobDto>,
    /// Convenience count of `jobs`.
    pub count: usize,
}

/// `POST /jobs/{id}/complete` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteJobRequest {
    /// Terminal status: `completed` or `failed`.
    pub status: String,
    /// Captured command output.
    #[serde(default)]
    pub output: Option<String>,
    /// Agent-reported error text.
    #[serde(default)]
    pub error: Option<String>,
    /// Process exit code, when captured.
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl CompleteJobRequest {
    /// Converts the wire report into a domain outcome.
    ///
    /// # Errors
    ///
    /// Returns the raw status string when it is neither `completed` nor
    /// `failed`.
    pub fn into_outcome(self) -> Result<JobOutcome, String> {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(JobOutcome::Completed {
                output: self.output,
                exit_code: self.exit_code,
            }),
            "failed" => Ok(JobOutcome::Failed {
                error: self.error,
                exit_code: self.exit_code,
            }),
            _ => Err(self.status),
        }
    }
}

/// `POST /jobs/{id}/complete` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteJobResponse {
    /// Resulting terminal job status.
    pub status: String,
    /// The completed job.
    pub job_id: JobId,
}

/// `GET /provision/callback/{token}` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionCallbackRequest {
    /// Agent-observed public IP address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Agent SSH public key.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Operating system description.
    #[serde(default)]
    pub os: Option<String>,
    /// Number of CPU cores.
    #[serde(default)]
    pub cpu_cores: Option<i32>,
    /// Total memory in megabytes.
    #[serde(default)]
    pub memory_mb: Option<i64>,
    /// Total disk in gigabytes.
    #[serde(default)]
    pub disk_gb: Option<i64>,
}

/// `GET /provision/callback/{token}` response body.
///
/// The agent token appears here exactly once; only its digest is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionCallbackResponse {
    /// Always `registered` on success.
    pub status: String,
    /// The registered server.
    pub server_id: ServerId,
    /// Long-lived bearer credential for all subsequent calls.
    pub agent_token: String,
}

/// `GET /firewall/confirm/{token}` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfirmResponse {
    /// Always `confirmed` on success.
    pub status: String,
    /// The confirmed rule.
    pub rule_id: crate::firewall::domain::RuleId,
}
