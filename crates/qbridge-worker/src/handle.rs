//! Exclusive, deadline-guarded access to one worker.
//!
//! The handle state machine:
//!
//! ```text
//!   Idle ──issue()──→ Busy ──→ Completed ──issue()──→ Busy ...
//!                       │
//!                       ├──→ Failed ───────┐
//!                       │                  ├──release()──→ Terminated
//!                       └──→ TimedOut ─────┘
//!                            (terminated immediately)
//! ```
//!
//! **Invariants:**
//! - At most one request is in flight: `issue` takes `&mut self`.
//! - A deadline is armed on every `issue`. When it fires the worker is
//!   killed before `issue` returns [`WorkerError::Timeout`].
//! - `Terminated` is permanent; `issue` then fails with
//!   [`WorkerError::Terminated`].
//! - `release` is idempotent. Dropping an unreleased handle still kills
//!   the worker.

use std::fmt;
use std::time::Duration;

use qbridge_proto::{Request, Response};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};
use crate::worker::{EventSink, Worker};

/// Default request deadline (5 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Lifecycle state of a [`WorkerHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, no request issued yet.
    Idle,
    /// A request is in flight.
    Busy,
    /// The last request succeeded.
    Completed,
    /// The last request failed.
    Failed,
    /// The deadline fired.
    TimedOut,
    /// The worker is gone.
    Terminated,
}

impl WorkerState {
    /// Check if the handle can accept a request.
    pub fn accepts_requests(self) -> bool {
        matches!(self, WorkerState::Idle | WorkerState::Completed)
    }

    /// Check if this is the permanent state.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Busy => "busy",
            WorkerState::Completed => "completed",
            WorkerState::Failed => "failed",
            WorkerState::TimedOut => "timed out",
            WorkerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Exclusive handle to one worker.
pub struct WorkerHandle {
    id: Uuid,
    worker: Box<dyn Worker>,
    state: WorkerState,
    timeout: Duration,
    timed_out: bool,
    permit: Option<OwnedSemaphorePermit>,
}

impl WorkerHandle {
    /// Wrap a worker with the given request deadline.
    pub fn new(worker: Box<dyn Worker>, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            worker,
            state: WorkerState::Idle,
            timeout,
            timed_out: false,
            permit: None,
        }
    }

    /// Hold a pool slot until the handle is released.
    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        self.worker.name()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the handle was terminated by its deadline.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Send one request and wait for its reply or the deadline.
    ///
    /// A `Failed` reply from the worker is returned as
    /// [`WorkerError::WorkerFailure`].
    #[instrument(skip_all, fields(worker = %self.id, kind = request.kind().as_str()))]
    pub async fn issue(&mut self, request: Request, events: EventSink) -> WorkerResult<Response> {
        match self.state {
            WorkerState::Idle | WorkerState::Completed => {}
            WorkerState::Busy => return Err(WorkerError::Busy),
            WorkerState::Failed => return Err(WorkerError::Unusable),
            WorkerState::TimedOut | WorkerState::Terminated => {
                return Err(WorkerError::Terminated);
            }
        }

        self.state = WorkerState::Busy;
        debug!("Issuing request with {} ms deadline", self.timeout.as_millis());

        match tokio::time::timeout(self.timeout, self.worker.call(request, events)).await {
            Ok(Ok(Response::Failed { error })) => {
                debug!("Worker reported failure: {}", error.message);
                self.state = WorkerState::Failed;
                Err(WorkerError::WorkerFailure(error))
            }
            Ok(Ok(response)) => {
                self.state = WorkerState::Completed;
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!("Worker call failed: {}", e);
                self.state = WorkerState::Failed;
                Err(e)
            }
            Err(_) => {
                warn!(
                    "Worker exceeded {} ms deadline, terminating",
                    self.timeout.as_millis()
                );
                self.state = WorkerState::TimedOut;
                self.timed_out = true;
                self.shutdown().await;
                Err(WorkerError::Timeout(self.timeout))
            }
        }
    }

    /// Terminate the worker and give back its pool slot. Idempotent.
    pub async fn release(&mut self) {
        self.shutdown().await;
        self.permit.take();
    }

    async fn shutdown(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Err(e) = self.worker.terminate().await {
            warn!("Failed to terminate worker {}: {}", self.id, e);
        }
        self.state = WorkerState::Terminated;
        debug!("Worker {} terminated", self.id);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.worker.start_kill();
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("worker", &self.worker.name())
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_accepts_requests() {
        assert!(WorkerState::Idle.accepts_requests());
        assert!(WorkerState::Completed.accepts_requests());
        assert!(!WorkerState::Busy.accepts_requests());
        assert!(!WorkerState::Failed.accepts_requests());
        assert!(!WorkerState::TimedOut.accepts_requests());
        assert!(!WorkerState::Terminated.accepts_requests());
    }

    #[test]
    fn test_only_terminated_is_terminal() {
        assert!(WorkerState::Terminated.is_terminal());
        assert!(!WorkerState::TimedOut.is_terminal());
        assert!(!WorkerState::Failed.is_terminal());
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(300));
    }
}
