//! In-memory metrics recorder.

use crate::server::domain::{ResourceSample, ServerId};
use crate::server::ports::{MetricsError, MetricsRecorder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

/// One recorded heartbeat sample.
#[derive(Debug, Clone)]
pub struct RecordedSample {
    /// Server that reported the sample.
    pub server_id: ServerId,
    /// The resource percentages reported.
    pub sample: ResourceSample,
    /// When the sample was appended.
    pub recorded_at: DateTime<Utc>,
}

/// Thread-safe in-memory metrics sink.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsRecorder {
    state: Arc<RwLock<Vec<RecordedSample>>>,
}

impl InMemoryMetricsRecorder {
    /// Creates an empty in-memory recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded sample.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when the internal lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<RecordedSample>, MetricsError> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.clone())
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> MetricsError {
    MetricsError::new(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl MetricsRecorder for InMemoryMetricsRecorder {
    async fn append(
        &self,
        server_id: ServerId,
        sample: &ResourceSample,
        now: DateTime<Utc>,
    ) -> Result<(), MetricsError> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        state.push(RecordedSample {
            server_id,
            sample: *sample,
            recorded_at: now,
        });
        Ok(())
    }
}
