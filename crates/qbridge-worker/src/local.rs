//! In-process worker: an [`Engine`] on a blocking thread.

use std::sync::Arc;

use async_trait::async_trait;
use qbridge_proto::{Request, Response, RunEvent};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::engine::{CancelToken, Engine};
use crate::error::{WorkerError, WorkerResult};
use crate::worker::{EventSink, Worker, WorkerSpawner};

/// Events buffered between the engine thread and the async side.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Worker that runs an engine on tokio's blocking pool.
pub struct LocalWorker {
    name: String,
    engine: Arc<dyn Engine>,
    cancel: CancelToken,
    event_buffer: usize,
    terminated: bool,
}

impl LocalWorker {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            name: format!("local:{}", engine.name()),
            engine,
            cancel: CancelToken::new(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            terminated: false,
        }
    }

    /// Set the engine-side event buffer size.
    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }
}

#[async_trait]
impl Worker for LocalWorker {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(worker = %self.name))]
    async fn call(&mut self, request: Request, events: EventSink) -> WorkerResult<Response> {
        if self.terminated || self.cancel.is_cancelled() {
            return Err(WorkerError::Terminated);
        }

        let kind = request.kind();
        let (tx, mut rx) = mpsc::channel(self.event_buffer);
        let engine = Arc::clone(&self.engine);
        let cancel = self.cancel.clone();

        let mut job = tokio::task::spawn_blocking(move || {
            let mut emit = |event: RunEvent| tx.blocking_send(event).is_ok();
            engine.execute(request, &mut emit, &cancel)
        });

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    if !events.deliver(event).await {
                        debug!("Event receiver closed, cancelling engine");
                        self.cancel.cancel();
                    }
                }
                joined = &mut job => {
                    let response = joined.map_err(|e| WorkerError::Crashed(e.to_string()))?;
                    // The engine's sender is gone; forward whatever is still buffered.
                    while let Ok(event) = rx.try_recv() {
                        if !events.deliver(event).await {
                            break;
                        }
                    }
                    return Ok(response.validate(kind)?);
                }
            }
        }
    }

    async fn terminate(&mut self) -> WorkerResult<()> {
        self.start_kill();
        Ok(())
    }

    fn start_kill(&mut self) {
        self.cancel.cancel();
        self.terminated = true;
    }
}

impl Drop for LocalWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns [`LocalWorker`]s sharing one engine.
pub struct LocalSpawner {
    engine: Arc<dyn Engine>,
    event_buffer: usize,
}

impl LocalSpawner {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }
}

#[async_trait]
impl WorkerSpawner for LocalSpawner {
    fn describe(&self) -> String {
        format!("in-process engine '{}'", self.engine.name())
    }

    async fn spawn(&self) -> WorkerResult<Box<dyn Worker>> {
        Ok(Box::new(
            LocalWorker::new(Arc::clone(&self.engine)).with_event_buffer(self.event_buffer),
        ))
    }
}
