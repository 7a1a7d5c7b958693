//! Server aggregate root: lifecycle status, provisioning phase, and agent
//! credential state.

use super::{
    ParseProvisioningPhaseError, ParseServerStatusError, ServerDomainError, ServerId, TenantId,
    heartbeat::ServerSpecs, token,
};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Server record exists but the agent has never called back.
    Pending,
    /// Agent registered; provisioning under way.
    Provisioning,
    /// A heartbeat was received within the expected interval.
    Active,
    /// Heartbeats stopped arriving (set by a liveness sweep).
    Offline,
    /// Operator marked the server failed.
    Failed,
}

impl ServerStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Offline => "offline",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServerStatus {
    type Error = ParseServerStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "provisioning" => Ok(Self::Provisioning),
            "active" => Ok(Self::Active),
            "offline" => Ok(Self::Offline),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseServerStatusError(value.to_owned())),
        }
    }
}

/// Coarse provisioning lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningPhase {
    /// No agent contact yet.
    Pending,
    /// Agent registered; waiting for its first heartbeat.
    Bootstrap,
    /// Provisioning steps instantiated and dispatched.
    Installing,
    /// Every required step finished.
    Completed,
    /// Operator abandoned a stalled install.
    Failed,
}

impl ProvisioningPhase {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Bootstrap => "bootstrap",
            Self::Installing => "installing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Monotonic ordering rank; phases may only move to a higher rank.
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Bootstrap => 1,
            Self::Installing => 2,
            Self::Completed | Self::Failed => 3,
        }
    }
}

impl std::fmt::Display for ProvisioningPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProvisioningPhase {
    type Error = ParseProvisioningPhaseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "bootstrap" => Ok(Self::Bootstrap),
            "installing" => Ok(Self::Installing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseProvisioningPhaseError(value.to_owned())),
        }
    }
}

/// Which optional catalog steps the tenant opted in or out of.
///
/// Required catalog entries are always provisioned; optional entries follow
/// their `is_default` flag unless listed here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSelection {
    /// Optional step types to provision even though they are not defaults.
    pub opt_in: Vec<String>,
    /// Default optional step types the tenant declined.
    pub opt_out: Vec<String>,
}

impl StackSelection {
    /// Returns whether an optional step of the given type and default flag
    /// should be provisioned.
    #[must_use]
    pub fn wants(&self, step_type: &str, is_default: bool) -> bool {
        if self.opt_in.iter().any(|t| t == step_type) {
            return true;
        }
        if self.opt_out.iter().any(|t| t == step_type) {
            return false;
        }
        is_default
    }
}

/// Server aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    id: ServerId,
    tenant_id: TenantId,
    name: String,
    status: ServerStatus,
    phase: ProvisioningPhase,
    stack: StackSelection,
    provision_token_digest: Option<String>,
    provision_token_expires_at: Option<DateTime<Utc>>,
    agent_token_digest: Option<String>,
    ip_address: Option<String>,
    public_key: Option<String>,
    specs: Option<ServerSpecs>,
    services_status: BTreeMap<String, String>,
    daemons_status: BTreeMap<String, String>,
    tools_status: BTreeMap<String, String>,
    database_health: Option<String>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted server aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedServerData {
    /// Persisted server identifier.
    pub id: ServerId,
    /// Persisted owning tenant.
    pub tenant_id: TenantId,
    /// Persisted display name.
    pub name: String,
    /// Persisted lifecycle status.
    pub status: ServerStatus,
    /// Persisted provisioning phase.
    pub phase: ProvisioningPhase,
    /// Persisted stack selection.
    pub stack: StackSelection,
    /// Persisted provision-token digest, if still outstanding.
    pub provision_token_digest: Option<String>,
    /// Persisted provision-token expiry, if any.
    pub provision_token_expires_at: Option<DateTime<Utc>>,
    /// Persisted agent bearer-token digest, once registered.
    pub agent_token_digest: Option<String>,
    /// Persisted agent-reported address.
    pub ip_address: Option<String>,
    /// Persisted agent public key.
    pub public_key: Option<String>,
    /// Persisted observed hardware facts.
    pub specs: Option<ServerSpecs>,
    /// Persisted observed per-service status map.
    pub services_status: BTreeMap<String, String>,
    /// Persisted observed per-daemon status map.
    pub daemons_status: BTreeMap<String, String>,
    /// Persisted observed tool-version map.
    pub tools_status: BTreeMap<String, String>,
    /// Persisted database health summary.
    pub database_health: Option<String>,
    /// Persisted last-heartbeat timestamp.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Server {
    /// Creates a new pending server with an outstanding one-time provision
    /// token digest.
    ///
    /// `provision_token_ttl` bounds how long the agent installer may take to
    /// call back; `None` leaves the token valid until used.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        stack: StackSelection,
        provision_token_digest: impl Into<String>,
        provision_token_ttl: Option<Duration>,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.utc();
        Self {
            id: ServerId::new(),
            tenant_id,
            name: name.into(),
            status: ServerStatus::Pending,
            phase: ProvisioningPhase::Pending,
            stack,
            provision_token_digest: Some(provision_token_digest.into()),
            provision_token_expires_at: provision_token_ttl.map(|ttl| now + ttl),
            agent_token_digest: None,
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
        }
    }

    /// Reconstructs a server from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedServerData) -> Self {
        Self {
            id: data.id,
            tenant_id: data.tenant_id,
            name: data.name,
            status: data.status,
            phase: data.phase,
            stack: data.stack,
            provision_token_digest: data.provision_token_digest,
            provision_token_expires_at: data.provision_token_expires_at,
            agent_token_digest: data.agent_token_digest,
            ip_address: data.ip_address,
            public_key: data.public_key,
            specs: data.specs,
            services_status: data.services_status,
            daemons_status: data.daemons_status,
            tools_status: data.tools_status,
            database_health: data.database_health,
            last_heartbeat_at: data.last_heartbeat_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the server identifier.
    #[must_use]
    pub const fn id(&self) -> ServerId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        self.status
    }

    /// Returns the provisioning phase.
    #[must_use]
    pub const fn phase(&self) -> ProvisioningPhase {
        self.phase
    }

    /// Returns the tenant's stack selection.
    #[must_use]
    pub const fn stack(&self) -> &StackSelection {
        &self.stack
    }

    /// Returns the agent bearer-token digest, once registered.
    #[must_use]
    pub fn agent_token_digest(&self) -> Option<&str> {
        self.agent_token_digest.as_deref()
    }

    /// Returns the outstanding provision-token digest, if any.
    #[must_use]
    pub fn provision_token_digest(&self) -> Option<&str> {
        self.provision_token_digest.as_deref()
    }

    /// Returns when the outstanding provision token expires, if bounded.
    #[must_use]
    pub const fn provision_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.provision_token_expires_at
    }

    /// Returns the agent-reported IP address, once registered.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the agent public key, once registered.
    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Returns the last observed hardware facts.
    #[must_use]
    pub const fn specs(&self) -> Option<&ServerSpecs> {
        self.specs.as_ref()
    }

    /// Returns the observed per-service status map.
    #[must_use]
    pub const fn services_status(&self) -> &BTreeMap<String, String> {
        &self.services_status
    }

    /// Returns the observed per-daemon status map.
    #[must_use]
    pub const fn daemons_status(&self) -> &BTreeMap<String, String> {
        &self.daemons_status
    }

    /// Returns the observed tool-version map.
    #[must_use]
    pub const fn tools_status(&self) -> &BTreeMap<String, String> {
        &self.tools_status
    }

    /// Returns the agent's last database health summary.
    #[must_use]
    pub fn database_health(&self) -> Option<&str> {
        self.database_health.as_deref()
    }

    /// Returns the last-heartbeat timestamp.
    #[must_use]
    pub const fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
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

    /// Returns `true` while the server is provisioning and has never sent a
    /// heartbeat.
    #[must_use]
    pub const fn is_awaiting_first_contact(&self) -> bool {
        matches!(self.status, ServerStatus::Provisioning) && self.last_heartbeat_at.is_none()
    }

    /// Consumes the one-time provision token and installs the agent bearer
    /// credential.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::NoProvisionToken`] when no token is
    /// outstanding, [`ServerDomainError::ProvisionTokenRejected`] when the
    /// presented secret does not match or has expired, and
    /// [`ServerDomainError::InvalidStatusTransition`] when the server is not
    /// pending.
    pub fn register_agent(
        &mut self,
        presented_token: &str,
        agent_token_digest: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServerDomainError> {
        let Some(stored_digest) = self.provision_token_digest.as_deref() else {
            return Err(ServerDomainError::NoProvisionToken);
        };
        if token::hash_secret(presented_token) != stored_digest {
            return Err(ServerDomainError::ProvisionTokenRejected);
        }
        if let Some(expires_at) = self.provision_token_expires_at
            && expires_at < now
        {
            return Err(ServerDomainError::ProvisionTokenRejected);
        }
        if self.status != ServerStatus::Pending {
            return Err(ServerDomainError::InvalidStatusTransition {
                from: self.status,
                to: ServerStatus::Provisioning,
            });
        }

        self.provision_token_digest = None;
        self.provision_token_expires_at = None;
        self.agent_token_digest = Some(agent_token_digest.into());
        self.status = ServerStatus::Provisioning;
        self.advance_phase(ProvisioningPhase::Bootstrap)?;
        self.touch(now);
        Ok(())
    }

    /// Records agent-reported registration facts.
    pub fn record_registration_facts(
        &mut self,
        ip_address: Option<String>,
        public_key: Option<String>,
        specs: Option<ServerSpecs>,
        now: DateTime<Utc>,
    ) {
        if ip_address.is_some() {
            self.ip_address = ip_address;
        }
        if public_key.is_some() {
            self.public_key = public_key;
        }
        if let Some(observed) = specs
            && !observed.is_empty()
        {
            self.specs = Some(observed);
        }
        self.touch(now);
    }

    /// Records a heartbeat: liveness wins, so the status becomes active
    /// regardless of what it was before. Returns the previous status.
    pub fn record_heartbeat(&mut self, now: DateTime<Utc>) -> ServerStatus {
        let previous = self.status;
        self.status = ServerStatus::Active;
        self.last_heartbeat_at = Some(now);
        self.touch(now);
        previous
    }

    /// Refreshes observed hardware facts from a heartbeat.
    pub fn observe_specs(&mut self, specs: ServerSpecs, now: DateTime<Utc>) {
        if !specs.is_empty() {
            self.specs = Some(specs);
            self.touch(now);
        }
    }

    /// Refreshes the observed per-service status map from a heartbeat.
    pub fn observe_services<I>(&mut self, statuses: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, status) in statuses {
            self.services_status.insert(name, status);
        }
        self.touch(now);
    }

    /// Refreshes the observed per-daemon status map from a heartbeat.
    pub fn observe_daemons<I>(&mut self, statuses: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        for (name, running) in statuses {
            let status = if running { "running" } else { "stopped" };
            self.daemons_status.insert(name, status.to_owned());
        }
        self.touch(now);
    }

    /// Refreshes the observed tool-version map from a heartbeat.
    pub fn observe_tools<I>(&mut self, versions: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, version) in versions {
            self.tools_status.insert(name, version);
        }
        self.touch(now);
    }

    /// Records the agent's latest database health summary.
    pub fn observe_database_health(&mut self, health: impl Into<String>, now: DateTime<Utc>) {
        self.database_health = Some(health.into());
        self.touch(now);
    }

    /// Advances the provisioning phase.
    ///
    /// Re-entering the current phase is a no-op so that replayed reports stay
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::PhaseRegression`] when the target phase
    /// ranks below the current one, and rejects `Failed` from anywhere but
    /// `Installing`.
    pub fn advance_phase(&mut self, to: ProvisioningPhase) -> Result<(), ServerDomainError> {
        if to == self.phase {
            return Ok(());
        }
        let regression = to.rank() <= self.phase.rank();
        let failed_outside_install =
            to == ProvisioningPhase::Failed && self.phase != ProvisioningPhase::Installing;
        if regression || failed_outside_install {
            return Err(ServerDomainError::PhaseRegression {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Marks the server offline (liveness sweep collaborator).
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStatusTransition`] unless the
    /// server is currently active.
    pub fn mark_offline(&mut self, now: DateTime<Utc>) -> Result<(), ServerDomainError> {
        if self.status != ServerStatus::Active {
            return Err(ServerDomainError::InvalidStatusTransition {
                from: self.status,
                to: ServerStatus::Offline,
            });
        }
        self.status = ServerStatus::Offline;
        self.touch(now);
        Ok(())
    }

    /// Marks the server failed (operator decision).
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.status = ServerStatus::Failed;
        self.touch(now);
    }

    /// Rotates the agent bearer credential digest.
    pub fn rotate_agent_token(&mut self, agent_token_digest: impl Into<String>, now: DateTime<Utc>) {
        self.agent_token_digest = Some(agent_token_digest.into());
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
