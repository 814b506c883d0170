//! Bounded worker pool.
//!
//! The pool caps how many workers are alive at once. Every `acquire` starts
//! a fresh worker, so no state carries over between commands; the slot is
//! returned when the handle is released or dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};
use crate::handle::{DEFAULT_TIMEOUT, WorkerHandle};
use crate::worker::WorkerSpawner;

/// Hands out [`WorkerHandle`]s, at most `capacity` at a time.
#[derive(Clone)]
pub struct WorkerPool {
    spawner: Arc<dyn WorkerSpawner>,
    slots: Arc<Semaphore>,
    capacity: usize,
    timeout: Duration,
}

impl WorkerPool {
    /// Create a pool with the default 5-minute request deadline.
    pub fn new(spawner: Arc<dyn WorkerSpawner>, capacity: usize) -> Self {
        Self {
            spawner,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the deadline armed on every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Slots not currently held by a handle.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Reserve a slot and start a worker.
    ///
    /// Fails immediately with [`WorkerError::ResourceUnavailable`] when all
    /// slots are taken; callers decide whether to retry.
    pub async fn acquire(&self) -> WorkerResult<WorkerHandle> {
        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| WorkerError::ResourceUnavailable {
                capacity: self.capacity,
            })?;

        debug!("Spawning worker via {}", self.spawner.describe());
        let worker = self.spawner.spawn().await?;
        let handle = WorkerHandle::new(worker, self.timeout).with_permit(permit);
        info!("Acquired worker {} ({})", handle.id(), handle.name());
        Ok(handle)
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("spawner", &self.spawner.describe())
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("timeout", &self.timeout)
            .finish()
    }
}
