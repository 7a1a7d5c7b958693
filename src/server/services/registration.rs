//! Server creation and one-time agent registration.
//!
//! A new server is handed a one-time provision token (plaintext returned
//! exactly once, digest stored). The installer script presents it on the
//! provision callback; the callback consumes it, records the agent's
//! facts, and issues the long-lived bearer token, again returned in
//! plaintext exactly once.

use crate::events::{DomainEvent, EventPublisher};
use crate::server::domain::{
    ProvisioningPhase, Server, ServerDomainError, ServerId, ServerSpecs, StackSelection, TenantId,
    token::{GeneratedSecret, hash_secret},
};
use crate::server::ports::{ServerRepository, ServerRepositoryError};
use chrono::Duration;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Default validity window for a provision token.
pub const DEFAULT_PROVISION_TOKEN_TTL_HOURS: i64 = 24;

/// Request payload for creating a managed server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateServerRequest {
    tenant_id: TenantId,
    name: String,
    stack: StackSelection,
    provision_token_ttl: Option<Duration>,
}

impl CreateServerRequest {
    /// Creates a request with the default token validity window.
    #[must_use]
    pub fn new(tenant_id: TenantId, name: impl Into<String>, stack: StackSelection) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            stack,
            provision_token_ttl: Some(Duration::hours(DEFAULT_PROVISION_TOKEN_TTL_HOURS)),
        }
    }

    /// Overrides the provision-token validity window; `None` leaves the
    /// token valid until used.
    #[must_use]
    pub const fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.provision_token_ttl = ttl;
        self
    }
}

/// A freshly created server and its one-time provision token.
#[derive(Debug, Clone)]
pub struct NewServer {
    /// The pending server.
    pub server: Server,
    /// Provision token plaintext; shown once, stored only as a digest.
    pub provision_token: String,
}

/// A registered agent's credentials.
#[derive(Debug, Clone)]
pub struct AgentCredentials {
    /// The server, now provisioning.
    pub server: Server,
    /// Bearer token plaintext; shown once, stored only as a digest.
    pub agent_token: String,
}

/// Facts the agent reports on its provision callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationFacts {
    /// Observed public address.
    pub ip_address: Option<String>,
    /// Agent SSH public key.
    pub public_key: Option<String>,
    /// Observed hardware facts.
    pub specs: Option<ServerSpecs>,
}

/// Service-level errors for registration operations.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The presented provision token matched no outstanding registration.
    #[error("provision token rejected")]
    TokenRejected,
    /// Domain transition failed.
    #[error(transparent)]
    Domain(#[from] ServerDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ServerRepositoryError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Orchestrates server creation and agent registration.
#[derive(Clone)]
pub struct RegistrationService<S, C>
where
    S: ServerRepository,
    C: Clock + Send + Sync,
{
    servers: Arc<S>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<C>,
}

impl<S, C> RegistrationService<S, C>
where
    S: ServerRepository,
    C: Clock + Send + Sync,
{
    /// Creates the service over the server repository, event sink, and
    /// clock.
    #[must_use]
    pub fn new(servers: Arc<S>, events: Arc<dyn EventPublisher>, clock: Arc<C>) -> Self {
        Self {
            servers,
            events,
            clock,
        }
    }

    /// Creates a pending server and returns its one-time provision token.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Repository`] when persistence fails.
    pub async fn create_server(&self, request: CreateServerRequest) -> RegistrationResult<NewServer> {
        let secret = GeneratedSecret::generate();
        let server = Server::new(
            request.tenant_id,
            request.name,
            request.stack,
            secret.digest(),
            request.provision_token_ttl,
            self.clock.as_ref(),
        );
        self.servers.insert(&server).await?;
        info!(server_id = %server.id(), tenant_id = %server.tenant_id(), "server created");
        let (provision_token, _digest) = secret.into_parts();
        Ok(NewServer {
            server,
            provision_token,
        })
    }

    /// Consumes a provision token, records registration facts, and issues
    /// the agent bearer token.
    ///
    /// Unknown, consumed, and expired tokens are indistinguishable to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::TokenRejected`] when the token matches
    /// no outstanding registration or fails validation.
    pub async fn provision_callback(
        &self,
        presented_token: &str,
        facts: RegistrationFacts,
    ) -> RegistrationResult<AgentCredentials> {
        let Some(mut server) = self
            .servers
            .find_by_provision_token_digest(&hash_secret(presented_token))
            .await?
        else {
            warn!("provision callback with unknown token rejected");
            return Err(RegistrationError::TokenRejected);
        };

        let now = self.clock.utc();
        let previous = server.status();
        let secret = GeneratedSecret::generate();
        server
            .register_agent(presented_token, secret.digest(), now)
            .map_err(|err| match err {
                ServerDomainError::ProvisionTokenRejected | ServerDomainError::NoProvisionToken => {
                    RegistrationError::TokenRejected
                }
                other => RegistrationError::Domain(other),
            })?;
        server.record_registration_facts(facts.ip_address, facts.public_key, facts.specs, now);
        self.servers.update(&server).await?;

        self.events.publish(DomainEvent::ServerStatusChanged {
            server_id: server.id(),
            tenant_id: server.tenant_id(),
            previous,
            current: server.status(),
        });
        self.events.publish(DomainEvent::ProvisioningPhaseChanged {
            server_id: server.id(),
            phase: ProvisioningPhase::Bootstrap,
        });
        info!(server_id = %server.id(), "agent registered, awaiting first heartbeat");

        let (agent_token, _digest) = secret.into_parts();
        Ok(AgentCredentials {
            server,
            agent_token,
        })
    }

    /// Resolves the server presenting an agent bearer token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Repository`] when lookup fails.
    pub async fn authenticate_agent(&self, bearer_token: &str) -> RegistrationResult<Option<Server>> {
        Ok(self
            .servers
            .find_by_agent_token_digest(&hash_secret(bearer_token))
            .await?)
    }

    /// Finds a server by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Repository`] when lookup fails.
    pub async fn find(&self, server_id: ServerId) -> RegistrationResult<Option<Server>> {
        Ok(self.servers.find_by_id(server_id).await?)
    }
}
