//! Supervised process records.
//!
//! A process row is the sole owner of any port it lists: port usage on a
//! server is always derived from current process rows, never cached, so
//! deleting a row is what releases its port.

use super::{AppDomainError, AppId, ParseProcessStatusError, ProcessId};
use crate::server::domain::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supervised process lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Row inserted to reserve its port; supervisor entry not yet live.
    Pending,
    /// Supervisor reports the process running.
    Running,
}

impl ProcessStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProcessStatus {
    type Error = ParseProcessStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            _ => Err(ParseProcessStatusError(value.to_owned())),
        }
    }
}

/// One supervisor-managed process on a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppProcess {
    id: ProcessId,
    server_id: ServerId,
    app_id: Option<AppId>,
    name: String,
    command: String,
    port: Option<u16>,
    status: ProcessStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted process.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedProcessData {
    /// Persisted process identifier.
    pub id: ProcessId,
    /// Persisted hosting server.
    pub server_id: ServerId,
    /// Persisted owning app, if any.
    pub app_id: Option<AppId>,
    /// Persisted supervisor program name.
    pub name: String,
    /// Persisted command line.
    pub command: String,
    /// Persisted reserved port.
    pub port: Option<u16>,
    /// Persisted lifecycle status.
    pub status: ProcessStatus,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl AppProcess {
    /// Creates a pending process record, reserving `port` if given.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        app_id: Option<AppId>,
        name: impl Into<String>,
        command: impl Into<String>,
        port: Option<u16>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProcessId::new(),
            server_id,
            app_id,
            name: name.into(),
            command: command.into(),
            port,
            status: ProcessStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a process from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedProcessData) -> Self {
        Self {
            id: data.id,
            server_id: data.server_id,
            app_id: data.app_id,
            name: data.name,
            command: data.command,
            port: data.port,
            status: data.status,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the process identifier.
    #[must_use]
    pub const fn id(&self) -> ProcessId {
        self.id
    }

    /// Returns the hosting server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the owning app, if any.
    #[must_use]
    pub const fn app_id(&self) -> Option<AppId> {
        self.app_id
    }

    /// Returns the supervisor program name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the supervised command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the reserved port, if any.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Marks the supervisor entry live.
    ///
    /// # Errors
    ///
    /// Returns [`AppDomainError::InvalidProcessTransition`] when the
    /// process is already running.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), AppDomainError> {
        if self.status != ProcessStatus::Pending {
            return Err(AppDomainError::InvalidProcessTransition {
                from: self.status,
                to: ProcessStatus::Running,
            });
        }
        self.status = ProcessStatus::Running;
        self.updated_at = now;
        Ok(())
    }
}
