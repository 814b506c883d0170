//! qbridge worker layer
//!
//! Everything between a command and a compute worker: the [`Worker`] trait
//! and its transports, the deadline-guarded [`WorkerHandle`], and the
//! [`WorkerPool`] that hands handles out.
//!
//! # Transports
//!
//! | Worker | Boundary | Termination |
//! |--------|----------|-------------|
//! | [`LocalWorker`] | blocking thread, bounded channel | cancel flag checked between shots |
//! | [`ProcessWorker`] | child process, JSON lines on stdio | kill |
//!
//! The worker side of the process transport is [`serve`], which hosts any
//! [`Engine`] behind stdin/stdout.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use qbridge_worker::{EventSink, LocalSpawner, WorkerPool};
//!
//! let pool = WorkerPool::new(Arc::new(LocalSpawner::new(engine)), 2)
//!     .with_timeout(Duration::from_secs(30));
//!
//! let mut handle = pool.acquire().await?;
//! let result = handle.issue(request, EventSink::none()).await;
//! handle.release().await;
//! ```

pub mod engine;
pub mod error;
pub mod handle;
pub mod local;
pub mod pool;
pub mod process;
pub mod server;
pub mod worker;

pub use engine::{CancelToken, Engine};
pub use error::{WorkerError, WorkerResult};
pub use handle::{DEFAULT_TIMEOUT, WorkerHandle, WorkerState};
pub use local::{DEFAULT_EVENT_BUFFER, LocalSpawner, LocalWorker};
pub use pool::WorkerPool;
pub use process::{ProcessSpawner, ProcessWorker};
pub use server::serve;
pub use worker::{EventSink, Worker, WorkerSpawner};
