//! Job aggregate root: one queued remote command and its lifecycle.

use super::{JobDomainError, JobId, ParseJobStatusError};
use crate::server::domain::{ServerId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default priority for jobs that do not specify one (lower is more urgent).
pub const DEFAULT_PRIORITY: i16 = 5;

/// Default retry budget surfaced to operators.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for an agent poll.
    Pending,
    /// Accepted into the queue; treated like pending for claiming.
    Queued,
    /// Claimed by the owning server's agent.
    Running,
    /// Agent reported success.
    Completed,
    /// Agent reported failure.
    Failed,
    /// Operator withdrew the job before it was claimed.
    Cancelled,
}

impl JobStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for statuses no further transition may leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` for statuses an agent poll may claim.
    #[must_use]
    pub const fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::Queued)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = ParseJobStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseJobStatusError(value.to_owned())),
        }
    }
}

/// Terminal outcome reported by the agent for a claimed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The remote command succeeded.
    Completed {
        /// Captured command output, if any.
        output: Option<String>,
        /// Process exit code, if the agent captured one.
        exit_code: Option<i32>,
    },
    /// The remote command failed.
    Failed {
        /// Agent-reported error text, recorded verbatim.
        error: Option<String>,
        /// Process exit code, if the agent captured one.
        exit_code: Option<i32>,
    },
}

impl JobOutcome {
    /// Returns `true` for successful outcomes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Returns the terminal status this outcome maps to.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }

    /// Returns the agent-reported error text, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error, .. } => error.as_deref(),
        }
    }
}

/// Job aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    server_id: ServerId,
    tenant_id: TenantId,
    job_type: String,
    payload: Value,
    status: JobStatus,
    priority: i16,
    retry_count: i32,
    max_retries: i32,
    output: Option<String>,
    error: Option<String>,
    exit_code: Option<i32>,
    created_at: DateTime<Utc>,
    queued_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted job aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedJobData {
    /// Persisted job identifier.
    pub id: JobId,
    /// Persisted target server.
    pub server_id: ServerId,
    /// Persisted owning tenant.
    pub tenant_id: TenantId,
    /// Persisted job type tag.
    pub job_type: String,
    /// Persisted opaque payload.
    pub payload: Value,
    /// Persisted lifecycle status.
    pub status: JobStatus,
    /// Persisted priority.
    pub priority: i16,
    /// Persisted retry bookkeeping.
    pub retry_count: i32,
    /// Persisted retry budget.
    pub max_retries: i32,
    /// Persisted remote output.
    pub output: Option<String>,
    /// Persisted remote error.
    pub error: Option<String>,
    /// Persisted exit code.
    pub exit_code: Option<i32>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted queue-acceptance timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Persisted claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a pending job awaiting an agent poll.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        tenant_id: TenantId,
        job_type: impl Into<String>,
        payload: Value,
        priority: i16,
        max_retries: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            server_id,
            tenant_id,
            job_type: job_type.into(),
            payload,
            status: JobStatus::Pending,
            priority,
            retry_count: 0,
            max_retries,
            output: None,
            error: None,
            exit_code: None,
            created_at: now,
            queued_at: Some(now),
            started_at: None,
            completed_at: None,
        }
    }

    /// Reconstructs a job from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedJobData) -> Self {
        Self {
            id: data.id,
            server_id: data.server_id,
            tenant_id: data.tenant_id,
            job_type: data.job_type,
            payload: data.payload,
            status: data.status,
            priority: data.priority,
            retry_count: data.retry_count,
            max_retries: data.max_retries,
            output: data.output,
            error: data.error,
            exit_code: data.exit_code,
            created_at: data.created_at,
            queued_at: data.queued_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
        }
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the target server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the job type tag, e.g. `provision_nginx`.
    #[must_use]
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Returns the opaque payload handed to the agent.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the priority (lower is more urgent).
    #[must_use]
    pub const fn priority(&self) -> i16 {
        self.priority
    }

    /// Returns how many times the creating operation re-enqueued this work.
    #[must_use]
    pub const fn retry_count(&self) -> i32 {
        self.retry_count
    }

    /// Returns the operator-facing retry budget.
    #[must_use]
    pub const fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// Returns the recorded remote output.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Returns the recorded remote error.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the recorded exit code.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the queue-acceptance timestamp.
    #[must_use]
    pub const fn queued_at(&self) -> Option<DateTime<Utc>> {
        self.queued_at
    }

    /// Returns the claim timestamp.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the completion timestamp.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns `true` once the job reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Claims the job for execution (pending → running).
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidTransition`] unless the job is
    /// claimable.
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), JobDomainError> {
        if !self.status.is_claimable() {
            return Err(JobDomainError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Applies the agent-reported terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::AlreadyTerminal`] when a first outcome has
    /// already been recorded; the recorded fields are left untouched.
    pub fn finish(&mut self, outcome: &JobOutcome, now: DateTime<Utc>) -> Result<(), JobDomainError> {
        if self.status.is_terminal() {
            return Err(JobDomainError::AlreadyTerminal(self.id));
        }
        match outcome {
            JobOutcome::Completed { output, exit_code } => {
                self.status = JobStatus::Completed;
                self.output.clone_from(output);
                self.exit_code = *exit_code;
            }
            JobOutcome::Failed { error, exit_code } => {
                self.status = JobStatus::Failed;
                self.error.clone_from(error);
                self.exit_code = *exit_code;
            }
        }
        self.completed_at = Some(now);
        Ok(())
    }

    /// Withdraws an unclaimed job (operator action; advisory in a pull
    /// model, so claimed jobs cannot be recalled).
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidTransition`] unless the job is still
    /// claimable.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), JobDomainError> {
        if !self.status.is_claimable() {
            return Err(JobDomainError::InvalidTransition {
                from: self.status,
                to: JobStatus::Cancelled,
            });
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(now);
        Ok(())
    }
}
