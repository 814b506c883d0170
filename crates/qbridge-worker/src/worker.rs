//! Worker and spawner traits.
//!
//! A [`Worker`] is one live compute worker, in-process or behind a pipe. It
//! serves one request at a time and streams run events into an
//! [`EventSink`] until it replies.

use async_trait::async_trait;
use qbridge_proto::{Request, Response, RunEvent};
use tokio::sync::mpsc;

use crate::error::WorkerResult;

/// Destination for run events produced while a request is served.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<RunEvent>>,
}

impl EventSink {
    /// A sink that discards events.
    pub fn none() -> Self {
        Self { tx: None }
    }

    /// A sink backed by a bounded channel.
    pub fn channel(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Whether anything is listening.
    pub fn is_attached(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver an event, waiting for capacity.
    ///
    /// Returns `false` once the receiver has gone away.
    pub async fn deliver(&self, event: RunEvent) -> bool {
        match &self.tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => true,
        }
    }
}

/// A live compute worker.
#[async_trait]
pub trait Worker: Send {
    /// Human-readable worker name for logs.
    fn name(&self) -> &str;

    /// Serve one request.
    ///
    /// Events for `Run` requests are pushed into `events` before the reply
    /// is returned. The returned response has already been checked against
    /// the request kind.
    async fn call(&mut self, request: Request, events: EventSink) -> WorkerResult<Response>;

    /// Stop the worker and wait for it to exit.
    async fn terminate(&mut self) -> WorkerResult<()>;

    /// Begin termination without waiting. Used when a handle is dropped.
    fn start_kill(&mut self);
}

/// Creates fresh workers for a pool.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Short description of what this spawner starts.
    fn describe(&self) -> String;

    /// Start a new worker.
    async fn spawn(&self) -> WorkerResult<Box<dyn Worker>>;
}
