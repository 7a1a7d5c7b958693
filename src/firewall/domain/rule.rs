//! Firewall rule aggregate with the confirm-or-rollback state machine.

use super::{
    FirewallDomainError, ParseActionError, ParseDirectionError, ParsePortSpecError,
    ParseProtocolError,
};
use crate::server::domain::{ServerId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// TCP ports the operator's own access depends on; deny rules touching them
/// always require confirmation.
pub const MANAGEMENT_PORTS: [u16; 2] = [22, 2222];

/// Unique identifier for a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Creates a new random rule identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a rule identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet direction a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Traffic arriving at the server.
    Inbound,
    /// Traffic leaving the server.
    Outbound,
}

impl Direction {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = ParseDirectionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            _ => Err(ParseDirectionError(value.to_owned())),
        }
    }
}

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Permit matching traffic.
    Allow,
    /// Drop matching traffic.
    Deny,
}

impl RuleAction {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl TryFrom<&str> for RuleAction {
    type Error = ParseActionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(ParseActionError(value.to_owned())),
        }
    }
}

/// Transport protocol a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleProtocol {
    /// TCP only.
    Tcp,
    /// UDP only.
    Udp,
    /// Any transport.
    Any,
}

impl RuleProtocol {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Any => "any",
        }
    }
}

impl TryFrom<&str> for RuleProtocol {
    type Error = ParseProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "any" => Ok(Self::Any),
            _ => Err(ParseProtocolError(value.to_owned())),
        }
    }
}

/// Ports a rule matches: everything, one port, or an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSpec {
    /// Every port.
    Any,
    /// A single port.
    Single(u16),
    /// An inclusive range.
    Range(u16, u16),
}

impl PortSpec {
    /// Builds a validated range specification.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallDomainError::InvalidPortRange`] when `start > end`
    /// or either bound is zero.
    pub const fn range(start: u16, end: u16) -> Result<Self, FirewallDomainError> {
        if start == 0 || end == 0 || start > end {
            return Err(FirewallDomainError::InvalidPortRange { start, end });
        }
        Ok(Self::Range(start, end))
    }

    /// Returns whether the specification covers a given port.
    #[must_use]
    pub const fn contains(self, port: u16) -> bool {
        match self {
            Self::Any => true,
            Self::Single(single) => single == port,
            Self::Range(start, end) => start <= port && port <= end,
        }
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub fn canonical(self) -> String {
        match self {
            Self::Any => "any".to_owned(),
            Self::Single(port) => port.to_string(),
            Self::Range(start, end) => format!("{start}:{end}"),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl TryFrom<&str> for PortSpec {
    type Error = ParsePortSpecError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized == "any" {
            return Ok(Self::Any);
        }
        if let Ok(port) = normalized.parse::<u16>() {
            return Ok(Self::Single(port));
        }
        if let Some((start, end)) = normalized.split_once(':')
            && let (Ok(start), Ok(end)) = (start.parse::<u16>(), end.parse::<u16>())
        {
            return Self::range(start, end).map_err(|_| ParsePortSpecError(value.to_owned()));
        }
        Err(ParsePortSpecError(value.to_owned()))
    }
}

/// Source a rule matches: unrestricted or a specific address/CIDR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// Unrestricted source.
    Any,
    /// A specific address or CIDR block, stored verbatim.
    Address(String),
}

impl RuleSource {
    /// Parses `any` or an address string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("any") || trimmed.is_empty() {
            Self::Any
        } else {
            Self::Address(trimmed.to_owned())
        }
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Any => "any".to_owned(),
            Self::Address(address) => address.clone(),
        }
    }

    /// Returns `true` for the unrestricted source.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Firewall rule aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    id: RuleId,
    server_id: ServerId,
    tenant_id: TenantId,
    direction: Direction,
    action: RuleAction,
    protocol: RuleProtocol,
    port_spec: PortSpec,
    source: RuleSource,
    is_active: bool,
    is_pending_confirmation: bool,
    confirmation_token_digest: Option<String>,
    confirmation_expires_at: Option<DateTime<Utc>>,
    rollback_reason: Option<String>,
    rolled_back_at: Option<DateTime<Utc>>,
    rule_order: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted firewall rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRuleData {
    /// Persisted rule identifier.
    pub id: RuleId,
    /// Persisted owning server.
    pub server_id: ServerId,
    /// Persisted owning tenant.
    pub tenant_id: TenantId,
    /// Persisted direction.
    pub direction: Direction,
    /// Persisted action.
    pub action: RuleAction,
    /// Persisted protocol.
    pub protocol: RuleProtocol,
    /// Persisted port specification.
    pub port_spec: PortSpec,
    /// Persisted source.
    pub source: RuleSource,
    /// Persisted active flag.
    pub is_active: bool,
    /// Persisted pending-confirmation flag.
    pub is_pending_confirmation: bool,
    /// Persisted confirmation-token digest.
    pub confirmation_token_digest: Option<String>,
    /// Persisted confirmation deadline.
    pub confirmation_expires_at: Option<DateTime<Utc>>,
    /// Persisted rollback reason.
    pub rollback_reason: Option<String>,
    /// Persisted rollback timestamp.
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Persisted evaluation order.
    pub rule_order: i16,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl FirewallRule {
    /// Creates an immediately-active rule.
    ///
    /// Activation is deliberate: the trial window genuinely blocks traffic,
    /// and confirmation exists to catch operator lockout, not to delay
    /// effect.
    #[must_use]
    #[expect(clippy::too_many_arguments, reason = "rule construction mirrors the persisted shape")]
    pub fn new(
        server_id: ServerId,
        tenant_id: TenantId,
        direction: Direction,
        action: RuleAction,
        protocol: RuleProtocol,
        port_spec: PortSpec,
        source: RuleSource,
        rule_order: i16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RuleId::new(),
            server_id,
            tenant_id,
            direction,
            action,
            protocol,
            port_spec,
            source,
            is_active: true,
            is_pending_confirmation: false,
            confirmation_token_digest: None,
            confirmation_expires_at: None,
            rollback_reason: None,
            rolled_back_at: None,
            rule_order,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a rule from persisted data without validation.
    #[must_use]
    pub fn from_persisted(data: PersistedRuleData) -> Self {
        Self {
            id: data.id,
            server_id: data.server_id,
            tenant_id: data.tenant_id,
            direction: data.direction,
            action: data.action,
            protocol: data.protocol,
            port_spec: data.port_spec,
            source: data.source,
            is_active: data.is_active,
            is_pending_confirmation: data.is_pending_confirmation,
            confirmation_token_digest: data.confirmation_token_digest,
            confirmation_expires_at: data.confirmation_expires_at,
            rollback_reason: data.rollback_reason,
            rolled_back_at: data.rolled_back_at,
            rule_order: data.rule_order,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the rule identifier.
    #[must_use]
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Returns the owning server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the packet direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the action.
    #[must_use]
    pub const fn action(&self) -> RuleAction {
        self.action
    }

    /// Returns the protocol.
    #[must_use]
    pub const fn protocol(&self) -> RuleProtocol {
        self.protocol
    }

    /// Returns the port specification.
    #[must_use]
    pub const fn port_spec(&self) -> PortSpec {
        self.port_spec
    }

    /// Returns the source specification.
    #[must_use]
    pub const fn source(&self) -> &RuleSource {
        &self.source
    }

    /// Returns whether the rule is currently live on the server.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether a confirmation is outstanding.
    #[must_use]
    pub const fn is_pending_confirmation(&self) -> bool {
        self.is_pending_confirmation
    }

    /// Returns the confirmation-token digest while pending.
    #[must_use]
    pub fn confirmation_token_digest(&self) -> Option<&str> {
        self.confirmation_token_digest.as_deref()
    }

    /// Returns the confirmation deadline while pending.
    #[must_use]
    pub const fn confirmation_expires_at(&self) -> Option<DateTime<Utc>> {
        self.confirmation_expires_at
    }

    /// Returns the recorded rollback reason, if rolled back.
    #[must_use]
    pub fn rollback_reason(&self) -> Option<&str> {
        self.rollback_reason.as_deref()
    }

    /// Returns when the rule was rolled back, if it was.
    #[must_use]
    pub const fn rolled_back_at(&self) -> Option<DateTime<Utc>> {
        self.rolled_back_at
    }

    /// Returns the evaluation order.
    #[must_use]
    pub const fn rule_order(&self) -> i16 {
        self.rule_order
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

    /// Decides whether applying this rule could sever the operator's own
    /// access and therefore needs the confirm-or-rollback window.
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        if self.action != RuleAction::Deny {
            return false;
        }
        let touches_management_port = MANAGEMENT_PORTS
            .iter()
            .any(|port| self.port_spec.contains(*port));
        let denies_all_inbound = self.direction == Direction::Inbound
            && matches!(self.port_spec, PortSpec::Any)
            && self.source.is_any();
        touches_management_port || denies_all_inbound || self.source.is_any()
    }

    /// Puts the rule into the confirmation window. The rule stays active.
    pub fn mark_pending_confirmation(
        &mut self,
        token_digest: impl Into<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.is_pending_confirmation = true;
        self.confirmation_token_digest = Some(token_digest.into());
        self.confirmation_expires_at = Some(expires_at);
        self.updated_at = now;
    }

    /// Resolves an outstanding confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallDomainError::NotPendingConfirmation`] when no
    /// confirmation is outstanding, keeping confirm idempotent-by-absence.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), FirewallDomainError> {
        if !self.is_pending_confirmation {
            return Err(FirewallDomainError::NotPendingConfirmation(self.id));
        }
        self.is_pending_confirmation = false;
        self.confirmation_token_digest = None;
        self.confirmation_expires_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Returns whether the confirmation window has lapsed.
    #[must_use]
    pub fn is_confirmation_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_pending_confirmation
            && self
                .confirmation_expires_at
                .is_some_and(|deadline| deadline < now)
    }

    /// Deactivates an unconfirmed rule, exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`FirewallDomainError::AlreadyRolledBack`] on a second
    /// rollback and [`FirewallDomainError::NotPendingConfirmation`] when the
    /// rule was confirmed in the meantime.
    pub fn roll_back(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), FirewallDomainError> {
        if self.rolled_back_at.is_some() {
            return Err(FirewallDomainError::AlreadyRolledBack(self.id));
        }
        if !self.is_pending_confirmation {
            return Err(FirewallDomainError::NotPendingConfirmation(self.id));
        }
        self.is_active = false;
        self.is_pending_confirmation = false;
        self.confirmation_token_digest = None;
        self.confirmation_expires_at = None;
        self.rollback_reason = Some(reason.into());
        self.rolled_back_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
