//! The compute seam hosted by workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use qbridge_proto::{Request, Response, RunEvent};

/// Shared cancellation flag checked by engines between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Synchronous compute engine (compiler, simulator, circuit builder).
///
/// Engines run on a blocking thread. `emit` returns `false` once nobody is
/// listening, which engines treat like cancellation.
pub trait Engine: Send + Sync + 'static {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Serve one request to completion.
    fn execute(
        &self,
        request: Request,
        emit: &mut dyn FnMut(RunEvent) -> bool,
        cancel: &CancelToken,
    ) -> Response;
}
