//! Lowest-free port allocation against a live usage source.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::netpool::domain::{PortAllocationError, PortPool};
use crate::netpool::ports::PortUsageSource;
use crate::server::domain::ServerId;

/// Largest number of ports a single batch request may reserve.
pub const MAX_BATCH_PORTS: usize = 100;

/// Snapshot of pool occupancy for a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortUsageStats {
    /// Total ports the pool spans.
    pub pool_size: usize,
    /// Ports currently held by live processes.
    pub used: usize,
    /// Ports still available.
    pub free: usize,
    /// Lowest port that would be handed out next, if any remain.
    pub lowest_free: Option<u16>,
}

/// Picks free ports for a server from a bounded pool.
///
/// The allocator reads usage fresh on every call and never caches, so a
/// port freed by deleting a process is reusable on the next allocation.
/// Selection is advisory: the reservation itself is serialized by the
/// process repository, and callers retry on a port conflict.
#[derive(Debug)]
pub struct PortAllocator<U> {
    pool: PortPool,
    usage: Arc<U>,
}

impl<U> Clone for PortAllocator<U> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool,
            usage: Arc::clone(&self.usage),
        }
    }
}

impl<U> PortAllocator<U>
where
    U: PortUsageSource,
{
    /// Creates an allocator over `pool` backed by `usage`.
    pub const fn new(pool: PortPool, usage: Arc<U>) -> Self {
        Self { pool, usage }
    }

    /// The pool this allocator draws from.
    #[must_use]
    pub const fn pool(&self) -> &PortPool {
        &self.pool
    }

    /// Reserves the lowest free port on `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PortAllocationError::Exhausted`] when every port in the
    /// pool is occupied, or [`PortAllocationError::Usage`] when the usage
    /// source fails.
    pub async fn allocate(&self, server_id: ServerId) -> Result<u16, PortAllocationError> {
        let used = self.used_ports(server_id).await?;
        self.pool
            .ports()
            .find(|port| !used.contains(port))
            .ok_or(PortAllocationError::Exhausted {
                pool_size: self.pool.size(),
            })
    }

    /// Reserves `count` free ports on `server_id`.
    ///
    /// Prefers the lowest contiguous run of `count` free ports; when no
    /// such run exists, falls back to the `count` lowest scattered free
    /// ports. The returned list is always ascending.
    ///
    /// # Errors
    ///
    /// Returns [`PortAllocationError::InvalidCount`] when `count` is zero
    /// or exceeds [`MAX_BATCH_PORTS`], [`PortAllocationError::Exhausted`]
    /// when fewer than `count` ports remain free, or
    /// [`PortAllocationError::Usage`] when the usage source fails.
    pub async fn allocate_many(
        &self,
        server_id: ServerId,
        count: usize,
    ) -> Result<Vec<u16>, PortAllocationError> {
        if count == 0 || count > MAX_BATCH_PORTS {
            return Err(PortAllocationError::InvalidCount {
                requested: count,
                max: MAX_BATCH_PORTS,
            });
        }
        let used = self.used_ports(server_id).await?;
        let free: Vec<u16> = self
            .pool
            .ports()
            .filter(|port| !used.contains(port))
            .collect();
        if free.len() < count {
            return Err(PortAllocationError::Exhausted {
                pool_size: self.pool.size(),
            });
        }
        if let Some(run) = lowest_contiguous_run(&free, count) {
            return Ok(run.to_vec());
        }
        Ok(free.into_iter().take(count).collect())
    }

    /// Whether `port` lies inside the pool and is currently free on
    /// `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PortAllocationError::Usage`] when the usage source fails.
    pub async fn is_available(
        &self,
        server_id: ServerId,
        port: u16,
    ) -> Result<bool, PortAllocationError> {
        if !self.pool.contains(port) {
            return Ok(false);
        }
        let used = self.used_ports(server_id).await?;
        Ok(!used.contains(&port))
    }

    /// Reports pool occupancy for `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PortAllocationError::Usage`] when the usage source fails.
    pub async fn usage_stats(
        &self,
        server_id: ServerId,
    ) -> Result<PortUsageStats, PortAllocationError> {
        let used = self.used_ports(server_id).await?;
        let pool_size = self.pool.size();
        let in_pool = used.iter().filter(|port| self.pool.contains(**port)).count();
        let lowest_free = self.pool.ports().find(|port| !used.contains(port));
        Ok(PortUsageStats {
            pool_size,
            used: in_pool,
            free: pool_size - in_pool,
            lowest_free,
        })
    }

    async fn used_ports(
        &self,
        server_id: ServerId,
    ) -> Result<BTreeSet<u16>, PortAllocationError> {
        self.usage
            .used_ports(server_id)
            .await
            .map_err(PortAllocationError::usage)
    }
}

/// Finds the lowest window of `count` consecutive port numbers within the
/// ascending `free` list.
fn lowest_contiguous_run(free: &[u16], count: usize) -> Option<&[u16]> {
    free.windows(count).find(|window| {
        match (window.first(), window.last()) {
            (Some(first), Some(last)) => usize::from(last - first) == count - 1,
            _ => false,
        }
    })
}
