//! Port pool bounds and allocation failures.

use std::sync::Arc;

use thiserror::Error;

/// Lowest port handed out when no explicit range is configured.
pub const DEFAULT_MIN_PORT: u16 = 3000;
/// Highest port handed out when no explicit range is configured.
pub const DEFAULT_MAX_PORT: u16 = 3999;

/// Inclusive range of ports that may be assigned to application processes
/// on a single server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPool {
    min: u16,
    max: u16,
}

impl Default for PortPool {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PORT,
            max: DEFAULT_MAX_PORT,
        }
    }
}

impl PortPool {
    /// Creates a pool spanning `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`PortAllocationError::InvalidRange`] when `min` exceeds
    /// `max`.
    pub const fn new(min: u16, max: u16) -> Result<Self, PortAllocationError> {
        if min > max {
            return Err(PortAllocationError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lowest port in the pool.
    #[must_use]
    pub const fn min(&self) -> u16 {
        self.min
    }

    /// Highest port in the pool.
    #[must_use]
    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports the pool spans.
    #[must_use]
    pub fn size(&self) -> usize {
        usize::from(self.max - self.min) + 1
    }

    /// Whether `port` falls inside the pool bounds.
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.min && port <= self.max
    }

    /// Iterates every port in the pool in ascending order.
    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.min..=self.max
    }
}

/// Failures raised while reserving ports from a pool.
#[derive(Debug, Error)]
pub enum PortAllocationError {
    /// The pool bounds are inverted.
    #[error("invalid port pool range {min}..={max}")]
    InvalidRange {
        /// Configured lower bound.
        min: u16,
        /// Configured upper bound.
        max: u16,
    },
    /// Every port in the pool is already in use.
    #[error("port pool exhausted: all {pool_size} ports in use")]
    Exhausted {
        /// Total number of ports the pool spans.
        pool_size: usize,
    },
    /// A batch request asked for zero ports or more than the batch cap.
    #[error("invalid port batch size {requested}: must be between 1 and {max}")]
    InvalidCount {
        /// Number of ports the caller asked for.
        requested: usize,
        /// Largest batch a single call may reserve.
        max: usize,
    },
    /// The underlying usage source failed.
    #[error("port usage lookup failed: {0}")]
    Usage(Arc<dyn std::error::Error + Send + Sync>),
}

impl PortAllocationError {
    /// Wraps a usage-source failure.
    pub fn usage<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Usage(Arc::new(error))
    }
}
