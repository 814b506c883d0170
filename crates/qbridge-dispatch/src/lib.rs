//! qbridge command dispatch
//!
//! Turns user commands into worker requests and their results into display
//! messages.
//!
//! - [`CommandDispatcher`]: histogram runs, circuit renders and checks
//! - [`EventAggregator`]: folds streamed run events into a [`Histogram`]
//! - [`DisplayPanel`]: an owned display slot over a [`DisplaySurface`]
//! - [`code_lenses`]: actions available per operation
//!
//! # Example
//!
//! ```ignore
//! use qbridge_dispatch::{CommandDispatcher, Document, MemorySurface};
//!
//! let display = MemorySurface::new();
//! let mut dispatcher = CommandDispatcher::new(
//!     pool,
//!     display.panel("histogram"),
//!     display.panel("circuit"),
//! );
//!
//! let doc = Document::new("bell.qb", source_text);
//! let histogram = dispatcher.run_histogram(&doc, None, 1000).await?;
//! println!("{:?}", histogram.most_frequent());
//! ```

pub mod aggregator;
pub mod dispatcher;
pub mod display;
pub mod document;
pub mod error;
pub mod lens;

pub use aggregator::{EventAggregator, Histogram, RefreshPolicy};
pub use dispatcher::{CheckReport, CommandDispatcher, DispatchConfig};
pub use display::{
    CircuitOutcome, CircuitResult, DisplayMessage, DisplayPanel, DisplaySurface, JsonSurface,
    MemorySurface,
};
pub use document::{Document, DocumentProvider};
pub use error::{DispatchError, DispatchResult};
pub use lens::{CodeLens, LensCommand, code_lenses};
