//! Port contracts for server state, provisioning, and observability.

mod metrics;
mod repository;

pub use metrics::{MetricsError, MetricsRecorder};
pub use repository::{
    ProvisioningStepRepository, ServerRepository, ServerRepositoryError, ServerRepositoryResult,
    ServiceRepository, ServiceRepositoryError, ServiceRepositoryResult, StepRepositoryError,
    StepRepositoryResult,
};
