//! Source of truth for ports currently in use on a server.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::server::domain::ServerId;

/// Failure raised while reading port usage.
#[derive(Debug, Clone, Error)]
#[error("failed to read port usage: {0}")]
pub struct PortUsageError(Arc<dyn std::error::Error + Send + Sync>);

impl PortUsageError {
    /// Wraps an adapter failure.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }
}

/// Reports which ports on a server are held by live processes.
///
/// A port counts as in use while any non-deleted process row references
/// it. Deleting a process releases its port immediately.
#[async_trait]
pub trait PortUsageSource: Send + Sync {
    /// Returns the set of ports currently occupied on `server_id`.
    async fn used_ports(&self, server_id: ServerId) -> Result<BTreeSet<u16>, PortUsageError>;
}
