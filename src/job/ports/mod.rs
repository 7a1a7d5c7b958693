//! Port contracts for the job queue.
//!
//! Ports define infrastructure-agnostic interfaces used by queue services.

pub mod repository;

pub use repository::{CompletionApply, JobRepository, JobRepositoryError, JobRepositoryResult};
