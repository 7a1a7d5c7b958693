//! Installed-service records reconciled from provisioning and heartbeats.

use super::{ParseServiceStatusError, ServerId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Installed-service lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Installation requested but not yet dispatched.
    Pending,
    /// An install job is in flight.
    Installing,
    /// The service is installed and observed running.
    Active,
    /// Installation failed or the service broke.
    Failed,
}

impl ServiceStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Installing => "installing",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for ServiceStatus {
    type Error = ParseServiceStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "installing" => Ok(Self::Installing),
            "active" => Ok(Self::Active),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseServiceStatusError(value.to_owned())),
        }
    }
}

/// One piece of installed software tracked on a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    id: ServiceId,
    server_id: ServerId,
    name: String,
    version: Option<String>,
    status: ServiceStatus,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted service record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedServiceData {
    /// Persisted service identifier.
    pub id: ServiceId,
    /// Persisted owning server.
    pub server_id: ServerId,
    /// Persisted service name.
    pub name: String,
    /// Persisted installed version.
    pub version: Option<String>,
    /// Persisted status.
    pub status: ServiceStatus,
    /// Persisted error, if installation failed.
    pub error: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// Creates a service record in the given initial status.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        name: impl Into<String>,
        status: ServiceStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ServiceId::new(),
            server_id,
            name: name.into(),
            version: None,
            status,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a service record from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedServiceData) -> Self {
        Self {
            id: data.id,
            server_id: data.server_id,
            name: data.name,
            version: data.version,
            status: data.status,
            error: data.error,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the service identifier.
    #[must_use]
    pub const fn id(&self) -> ServiceId {
        self.id
    }

    /// Returns the owning server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the service name, e.g. `nginx`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the installed version, when known.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Returns the recorded error, if installation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
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

    /// Marks the service active, clearing any stale error.
    pub fn mark_active(&mut self, version: Option<String>, now: DateTime<Utc>) {
        self.status = ServiceStatus::Active;
        if version.is_some() {
            self.version = version;
        }
        self.error = None;
        self.updated_at = now;
    }

    /// Marks the service failed with the agent-reported error.
    pub fn mark_failed(&mut self, error: Option<String>, now: DateTime<Utc>) {
        self.status = ServiceStatus::Failed;
        self.error = error;
        self.updated_at = now;
    }

    /// Marks an install job in flight.
    pub fn mark_installing(&mut self, now: DateTime<Utc>) {
        self.status = ServiceStatus::Installing;
        self.updated_at = now;
    }
}
