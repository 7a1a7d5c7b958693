//! `PostgreSQL` append-only sink for heartbeat resource samples.

use super::{models::MetricRow, schema::server_metrics};
use crate::job::adapters::postgres::JobPgPool;
use crate::server::domain::{ResourceSample, ServerId};
use crate::server::ports::{MetricsError, MetricsRecorder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// `PostgreSQL`-backed metrics recorder.
#[derive(Debug, Clone)]
pub struct PostgresMetricsRecorder {
    pool: JobPgPool,
}

impl PostgresMetricsRecorder {
    /// Creates a new recorder from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsRecorder for PostgresMetricsRecorder {
    async fn append(
        &self,
        server_id: ServerId,
        sample: &ResourceSample,
        now: DateTime<Utc>,
    ) -> Result<(), MetricsError> {
        let row = MetricRow {
            id: uuid::Uuid::new_v4(),
            server_id: server_id.into_inner(),
            cpu_pct: sample.cpu_pct,
            memory_pct: sample.memory_pct,
            disk_pct: sample.disk_pct,
            recorded_at: now,
        };
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(MetricsError::new)?;
            diesel::insert_into(server_metrics::table)
                .values(&row)
                .execute(&mut connection)
                .map_err(MetricsError::new)?;
            Ok(())
        })
        .await
        .map_err(MetricsError::new)?
    }
}
