//! Error types for worker operations.

use std::time::Duration;

use qbridge_proto::{ProtoError, WorkerFault};
use thiserror::Error;

/// Errors that can occur while acquiring or talking to a worker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkerError {
    /// The request exceeded its deadline; the worker was terminated.
    #[error("Worker timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The worker answered with an error.
    #[error("Worker failed: {0}")]
    WorkerFailure(WorkerFault),

    /// The handle was terminated and accepts no further requests.
    #[error("Worker handle is terminated")]
    Terminated,

    /// A previous request on this handle never finished.
    #[error("A request is already in flight on this worker")]
    Busy,

    /// A previous request failed; the handle must be released.
    #[error("Worker is unusable after a failed request")]
    Unusable,

    /// Every pool slot is taken.
    #[error("No worker available: all {capacity} slots are in use")]
    ResourceUnavailable { capacity: usize },

    /// A frame could not be decoded or did not match the request.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtoError),

    /// The worker closed its output before replying.
    #[error("Worker disconnected before replying")]
    Disconnected,

    /// The worker could not be started.
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// The worker thread panicked.
    #[error("Worker crashed: {0}")]
    Crashed(String),

    /// I/O error on the worker pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Whether this error came from the deadline firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Timeout(_))
    }
}

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;
