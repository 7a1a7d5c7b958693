//! In-memory adapters for tests and local development.

mod metrics;
mod server;
mod service;
mod step;

pub use metrics::{InMemoryMetricsRecorder, RecordedSample};
pub use server::InMemoryServerRepository;
pub use service::InMemoryServiceRepository;
pub use step::InMemoryStepRepository;
