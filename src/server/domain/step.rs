//! Provisioning step aggregate: one catalog-driven installable component
//! tracked independently within the installing phase.

use super::{ParseStepCategoryError, ParseStepStatusError, ServerDomainError, ServerId, StepId};
use crate::job::domain::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provisioning step lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step instantiated but no job enqueued yet.
    Pending,
    /// A job has been enqueued for this step.
    Queued,
    /// The agent claimed the step's job.
    InProgress,
    /// The agent reported success.
    Completed,
    /// The agent reported failure.
    Failed,
    /// Operator excused the step.
    Skipped,
}

impl StepStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Returns `true` for statuses no job outcome may change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StepStatus {
    type Error = ParseStepStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(ParseStepStatusError(value.to_owned())),
        }
    }
}

/// Catalog category a provisioning step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    /// Base system preparation (package update, firewall baseline).
    System,
    /// Web server installation.
    WebServer,
    /// PHP runtime installation.
    Php,
    /// Database engine installation.
    Database,
    /// Cache engine installation.
    Cache,
    /// Process supervisor installation.
    Supervisor,
    /// Additional language runtime installation.
    Runtime,
}

impl StepCategory {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::WebServer => "web_server",
            Self::Php => "php",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::Supervisor => "supervisor",
            Self::Runtime => "runtime",
        }
    }
}

impl TryFrom<&str> for StepCategory {
    type Error = ParseStepCategoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "system" => Ok(Self::System),
            "web_server" => Ok(Self::WebServer),
            "php" => Ok(Self::Php),
            "database" => Ok(Self::Database),
            "cache" => Ok(Self::Cache),
            "supervisor" => Ok(Self::Supervisor),
            "runtime" => Ok(Self::Runtime),
            _ => Err(ParseStepCategoryError(value.to_owned())),
        }
    }
}

/// One unit of the provisioning sequence for a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningStep {
    id: StepId,
    server_id: ServerId,
    step_type: String,
    category: StepCategory,
    order: i16,
    is_required: bool,
    status: StepStatus,
    job_id: Option<JobId>,
    output: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedStepData {
    /// Persisted step identifier.
    pub id: StepId,
    /// Persisted owning server.
    pub server_id: ServerId,
    /// Persisted step type tag.
    pub step_type: String,
    /// Persisted category.
    pub category: StepCategory,
    /// Persisted catalog order.
    pub order: i16,
    /// Persisted required flag.
    pub is_required: bool,
    /// Persisted status.
    pub status: StepStatus,
    /// Persisted linked job, while in flight.
    pub job_id: Option<JobId>,
    /// Persisted remote output.
    pub output: Option<String>,
    /// Persisted remote error.
    pub error: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningStep {
    /// Creates a pending step for a server from catalog attributes.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        step_type: impl Into<String>,
        category: StepCategory,
        order: i16,
        is_required: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StepId::new(),
            server_id,
            step_type: step_type.into(),
            category,
            order,
            is_required,
            status: StepStatus::Pending,
            job_id: None,
            output: None,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Reconstructs a step from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedStepData) -> Self {
        Self {
            id: data.id,
            server_id: data.server_id,
            step_type: data.step_type,
            category: data.category,
            order: data.order,
            is_required: data.is_required,
            status: data.status,
            job_id: data.job_id,
            output: data.output,
            error: data.error,
            created_at: data.created_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
        }
    }

    /// Returns the step identifier.
    #[must_use]
    pub const fn id(&self) -> StepId {
        self.id
    }

    /// Returns the owning server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the step type tag, e.g. `provision_nginx`.
    #[must_use]
    pub fn step_type(&self) -> &str {
        &self.step_type
    }

    /// Returns the catalog category.
    #[must_use]
    pub const fn category(&self) -> StepCategory {
        self.category
    }

    /// Returns the catalog order.
    #[must_use]
    pub const fn order(&self) -> i16 {
        self.order
    }

    /// Returns whether a failure here blocks phase completion.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.is_required
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> StepStatus {
        self.status
    }

    /// Returns the linked job, while in flight.
    #[must_use]
    pub const fn job_id(&self) -> Option<JobId> {
        self.job_id
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

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the start timestamp, once in progress.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the completion timestamp, once terminal.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns `true` when the step counts towards phase completion.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Skipped)
    }

    /// Links the step to its enqueued job.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStepTransition`] unless the step
    /// is pending.
    pub fn mark_queued(&mut self, job_id: JobId) -> Result<(), ServerDomainError> {
        self.transition(StepStatus::Pending, StepStatus::Queued)?;
        self.job_id = Some(job_id);
        Ok(())
    }

    /// Records that the agent claimed the step's job.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStepTransition`] unless the step
    /// is queued.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), ServerDomainError> {
        self.transition(StepStatus::Queued, StepStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Records a successful job outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStepTransition`] when the step is
    /// already terminal.
    pub fn complete(
        &mut self,
        output: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServerDomainError> {
        self.terminate(StepStatus::Completed, now)?;
        self.output = output;
        Ok(())
    }

    /// Records a failed job outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStepTransition`] when the step is
    /// already terminal.
    pub fn fail(
        &mut self,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServerDomainError> {
        self.terminate(StepStatus::Failed, now)?;
        self.error = error;
        Ok(())
    }

    /// Excuses the step from the provisioning sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStepTransition`] when the step is
    /// already terminal.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<(), ServerDomainError> {
        self.terminate(StepStatus::Skipped, now)
    }

    fn transition(&mut self, expected: StepStatus, to: StepStatus) -> Result<(), ServerDomainError> {
        if self.status != expected {
            return Err(ServerDomainError::InvalidStepTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn terminate(&mut self, to: StepStatus, now: DateTime<Utc>) -> Result<(), ServerDomainError> {
        if self.status.is_terminal() {
            return Err(ServerDomainError::InvalidStepTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.completed_at = Some(now);
        Ok(())
    }
}
