//! Error types for command dispatch.

use std::time::Duration;

use qbridge_proto::WorkerFault;
use qbridge_worker::WorkerError;
use thiserror::Error;

/// Errors surfaced to the caller of a dispatcher command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No document to operate on; no worker was acquired.
    #[error("No active document")]
    NoActiveDocument,

    /// The request exceeded its deadline and the worker was terminated.
    #[error("Timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The worker answered with an error.
    #[error("{0}")]
    WorkerFailure(WorkerFault),

    /// Every worker slot is in use.
    #[error("No worker available ({capacity} in use)")]
    ResourceUnavailable { capacity: usize },

    /// A display surface could not be written.
    #[error("Display error: {0}")]
    Display(String),

    /// Any other worker-boundary failure.
    #[error(transparent)]
    Worker(WorkerError),
}

impl From<WorkerError> for DispatchError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Timeout(after) => DispatchError::Timeout(after),
            WorkerError::WorkerFailure(fault) => DispatchError::WorkerFailure(fault),
            WorkerError::ResourceUnavailable { capacity } => {
                DispatchError::ResourceUnavailable { capacity }
            }
            other => DispatchError::Worker(other),
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Display(err.to_string())
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        DispatchError::Display(err.to_string())
    }
}

/// Result type for dispatcher commands.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use qbridge_proto::FaultKind;

    #[test]
    fn test_worker_errors_map_to_taxonomy() {
        let err: DispatchError = WorkerError::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(err, DispatchError::Timeout(d) if d.as_millis() == 50));
        assert_eq!(err.to_string(), "Timed out after 50 ms");

        let fault = WorkerFault::new(FaultKind::Compile, "unknown gate 'hh'");
        let err: DispatchError = WorkerError::WorkerFailure(fault).into();
        assert_eq!(err.to_string(), "unknown gate 'hh'");

        let err: DispatchError = WorkerError::ResourceUnavailable { capacity: 2 }.into();
        assert!(matches!(err, DispatchError::ResourceUnavailable { capacity: 2 }));

        let err: DispatchError = WorkerError::Disconnected.into();
        assert!(matches!(err, DispatchError::Worker(WorkerError::Disconnected)));
    }
}
