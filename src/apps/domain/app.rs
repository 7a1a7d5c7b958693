//! Web app aggregate: one site or application hosted on a managed server.

use super::{AppDomainError, AppId, ParseAppRuntimeError, ParseWebAppStatusError};
use crate::server::domain::{ServerId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime the app is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRuntime {
    /// PHP behind the web server's FastCGI pass.
    Php,
    /// Node.js behind a reverse proxy on an allocated port.
    Node,
}

impl AppRuntime {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Php => "php",
            Self::Node => "node",
        }
    }

    /// Whether apps of this runtime listen on an allocated port.
    #[must_use]
    pub const fn needs_port(self) -> bool {
        matches!(self, Self::Node)
    }
}

impl fmt::Display for AppRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AppRuntime {
    type Error = ParseAppRuntimeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "php" => Ok(Self::Php),
            "node" => Ok(Self::Node),
            _ => Err(ParseAppRuntimeError(value.to_owned())),
        }
    }
}

/// App creation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebAppStatus {
    /// Creation job enqueued, awaiting the agent's report.
    Pending,
    /// Agent confirmed the app is serving.
    Active,
    /// Agent reported the remote creation failed.
    Failed,
}

impl WebAppStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WebAppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for WebAppStatus {
    type Error = ParseWebAppStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseWebAppStatusError(value.to_owned())),
        }
    }
}

/// Web app aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebApp {
    id: AppId,
    server_id: ServerId,
    tenant_id: TenantId,
    domain: String,
    system_user: String,
    runtime: AppRuntime,
    port: Option<u16>,
    status: WebAppStatus,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted web app.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedWebAppData {
    /// Persisted app identifier.
    pub id: AppId,
    /// Persisted hosting server.
    pub server_id: ServerId,
    /// Persisted owning tenant.
    pub tenant_id: TenantId,
    /// Persisted site domain.
    pub domain: String,
    /// Persisted system user.
    pub system_user: String,
    /// Persisted runtime.
    pub runtime: AppRuntime,
    /// Persisted allocated port.
    pub port: Option<u16>,
    /// Persisted creation status.
    pub status: WebAppStatus,
    /// Persisted remote error.
    pub error: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl WebApp {
    /// Creates a pending app awaiting remote creation.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        tenant_id: TenantId,
        domain: impl Into<String>,
        system_user: impl Into<String>,
        runtime: AppRuntime,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AppId::new(),
            server_id,
            tenant_id,
            domain: domain.into(),
            system_user: system_user.into(),
            runtime,
            port: None,
            status: WebAppStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs an app from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedWebAppData) -> Self {
        Self {
            id: data.id,
            server_id: data.server_id,
            tenant_id: data.tenant_id,
            domain: data.domain,
            system_user: data.system_user,
            runtime: data.runtime,
            port: data.port,
            status: data.status,
            error: data.error,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the app identifier.
    #[must_use]
    pub const fn id(&self) -> AppId {
        self.id
    }

    /// Returns the hosting server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the site domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the system user the app runs as.
    #[must_use]
    pub fn system_user(&self) -> &str {
        &self.system_user
    }

    /// Returns the runtime.
    #[must_use]
    pub const fn runtime(&self) -> AppRuntime {
        self.runtime
    }

    /// Returns the allocated port, if the runtime needs one.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the creation status.
    #[must_use]
    pub const fn status(&self) -> WebAppStatus {
        self.status
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

    /// Returns the last-update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records the port reserved for this app before it is persisted.
    pub fn assign_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    /// Marks the app as serving after the agent confirmed creation.
    ///
    /// # Errors
    ///
    /// Returns [`AppDomainError::InvalidStatusTransition`] when the app has
    /// already been resolved.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), AppDomainError> {
        if self.status != WebAppStatus::Pending {
            return Err(AppDomainError::InvalidStatusTransition {
                from: self.status,
                to: WebAppStatus::Active,
            });
        }
        self.status = WebAppStatus::Active;
        self.error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Marks the remote creation as failed.
    ///
    /// # Errors
    ///
    /// Returns [`AppDomainError::InvalidStatusTransition`] when the app has
    /// already been resolved.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppDomainError> {
        if self.status != WebAppStatus::Pending {
            return Err(AppDomainError::InvalidStatusTransition {
                from: self.status,
                to: WebAppStatus::Failed,
            });
        }
        self.status = WebAppStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = now;
        Ok(())
    }
}
