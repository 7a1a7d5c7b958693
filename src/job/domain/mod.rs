//! Domain model for the remote-command job queue.
//!
//! A job is one unit of remote work dispatched to a server's agent through
//! the pull protocol. The aggregate enforces forward-only lifecycle
//! transitions and immutability once terminal; claim atomicity lives in the
//! repository ports, not here.

mod error;
mod ids;
mod job;

pub use error::{JobDomainError, ParseJobStatusError};
pub use ids::JobId;
pub use job::{DEFAULT_MAX_RETRIES, DEFAULT_PRIORITY, Job, JobOutcome, JobStatus, PersistedJobData};
