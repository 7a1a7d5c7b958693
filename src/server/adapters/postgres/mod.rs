//! `PostgreSQL` persistence adapters for server state.

mod metrics;
mod models;
mod schema;
mod server;
mod service;
mod step;

pub use metrics::PostgresMetricsRecorder;
pub use server::PostgresServerRepository;
pub use service::PostgresServiceRepository;
pub use step::PostgresStepRepository;
