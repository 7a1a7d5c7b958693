//! Type-keyed completion dispatch.
//!
//! After a job's outcome is persisted, the job type selects a handler that
//! mutates the relevant domain entity. The handler map is built and
//! validated at startup; at runtime unknown types are a logged no-op so
//! newer agents reporting unrecognized job types degrade safely.

use crate::job::domain::Job;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Error surfaced by a completion handler.
///
/// Handler failures are logged and swallowed by the dispatcher; they must
/// never unwind an already-persisted completion.
#[derive(Debug, Clone, Error)]
#[error("completion handler failed: {0}")]
pub struct CompletionHandlerError(Arc<dyn std::error::Error + Send + Sync>);

impl CompletionHandlerError {
    /// Wraps a handler-internal error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}

/// Callback invoked after a job of a registered type reaches a terminal
/// status. The job passed in already carries its recorded outcome fields.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    /// Reacts to the terminal job.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionHandlerError`] when the downstream mutation
    /// fails; the dispatcher logs and swallows it.
    async fn on_complete(&self, job: &Job) -> Result<(), CompletionHandlerError>;
}

/// Errors raised while building or validating the handler map.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerRegistryError {
    /// Two handlers were registered for the same job type.
    #[error("duplicate completion handler for job type '{0}'")]
    DuplicateType(String),

    /// A job type expected at startup has no handler.
    #[error("no completion handler registered for job type '{0}'")]
    MissingType(String),
}

/// Startup-assembled map from job type to completion handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn CompletionHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a job type.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerRegistryError::DuplicateType`] when the type already
    /// has a handler; double registration is always a wiring bug.
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        handler: Arc<dyn CompletionHandler>,
    ) -> Result<(), HandlerRegistryError> {
        let key = job_type.into();
        if self.handlers.contains_key(&key) {
            return Err(HandlerRegistryError::DuplicateType(key));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Verifies that every expected job type has a handler, for fail-fast
    /// startup validation.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerRegistryError::MissingType`] naming the first
    /// unregistered type.
    pub fn ensure_registered(&self, expected: &[&str]) -> Result<(), HandlerRegistryError> {
        for job_type in expected {
            if !self.handlers.contains_key(*job_type) {
                return Err(HandlerRegistryError::MissingType((*job_type).to_owned()));
            }
        }
        Ok(())
    }

    /// Returns whether a handler exists for the job type.
    #[must_use]
    pub fn handles(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Dispatches a terminal job to its handler.
    ///
    /// Unknown types and handler failures are logged and swallowed: the
    /// completion is already durable, and forward-compatible agents may
    /// report types this control plane does not yet recognize.
    pub async fn dispatch(&self, job: &Job) {
        let Some(handler) = self.handlers.get(job.job_type()) else {
            debug!(job_id = %job.id(), job_type = job.job_type(), "no completion handler; ignoring");
            return;
        };
        if let Err(err) = handler.on_complete(job).await {
            error!(
                job_id = %job.id(),
                job_type = job.job_type(),
                error = %err,
                "completion handler failed"
            );
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("types", &types)
            .finish()
    }
}
