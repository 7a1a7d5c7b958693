//! Application services for the job queue.

mod dispatch;
mod queue;

pub use dispatch::{
    CompletionHandler, CompletionHandlerError, HandlerRegistry, HandlerRegistryError,
};
pub use queue::{EnqueueJobRequest, JobQueueError, JobQueueResult, JobQueueService};
