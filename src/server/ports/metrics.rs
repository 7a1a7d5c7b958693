//! Append-only sink for heartbeat resource samples.

use crate::server::domain::{ResourceSample, ServerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Failure raised while appending a metric sample.
#[derive(Debug, Clone, Error)]
#[error("failed to append metric sample: {0}")]
pub struct MetricsError(Arc<dyn std::error::Error + Send + Sync>);

impl MetricsError {
    /// Wraps an adapter failure.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }
}

/// Time-series sink for per-heartbeat resource percentages. Append
/// failures are logged by the reconciler and never fail the heartbeat.
#[async_trait]
pub trait MetricsRecorder: Send + Sync {
    /// Appends one sample for a server.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when the sample cannot be stored.
    async fn append(
        &self,
        server_id: ServerId,
        sample: &ResourceSample,
        now: DateTime<Utc>,
    ) -> Result<(), MetricsError>;
}
