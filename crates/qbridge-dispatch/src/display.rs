//! Display protocol and panels.
//!
//! Results reach the user as [`DisplayMessage`]s posted to a
//! [`DisplaySurface`]. A [`DisplayPanel`] owns at most one surface of its
//! kind: the first post creates it, later posts reuse it, and `dispose`
//! closes it so the next post starts a fresh one.
//!
//! Wire form, one JSON object per message:
//!
//! ```text
//! {"command":"update","buckets":[["00",512],["11",488]]}
//! {"command":"circuit","title":"Bell","subtitle":"...","circuit":{...}}
//! {"command":"circuit","title":"Bell","subtitle":"...","error":"..."}
//! {"command":"error","title":"Histogram","message":"..."}
//! ```

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use qbridge_proto::CircuitData;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::Histogram;
use crate::error::DispatchResult;

/// Either circuit data or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitOutcome {
    Circuit(CircuitData),
    Error(String),
}

/// Result of a circuit render, always titled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitResult {
    pub title: String,
    pub subtitle: String,
    #[serde(flatten)]
    pub outcome: CircuitOutcome,
}

impl CircuitResult {
    pub fn circuit(title: impl Into<String>, subtitle: impl Into<String>, circuit: CircuitData) -> Self {
        Self::titled(title.into(), subtitle.into(), CircuitOutcome::Circuit(circuit))
    }

    pub fn error(title: impl Into<String>, subtitle: impl Into<String>, error: impl Into<String>) -> Self {
        Self::titled(title.into(), subtitle.into(), CircuitOutcome::Error(error.into()))
    }

    // Empty titles are replaced so a panel never shows a blank header.
    fn titled(title: String, subtitle: String, outcome: CircuitOutcome) -> Self {
        Self {
            title: if title.trim().is_empty() { "Circuit".into() } else { title },
            subtitle: if subtitle.trim().is_empty() { "qbridge".into() } else { subtitle },
            outcome,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, CircuitOutcome::Error(_))
    }

    pub fn circuit_data(&self) -> Option<&CircuitData> {
        match &self.outcome {
            CircuitOutcome::Circuit(data) => Some(data),
            CircuitOutcome::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            CircuitOutcome::Circuit(_) => None,
            CircuitOutcome::Error(message) => Some(message),
        }
    }
}

/// A message for a display surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DisplayMessage {
    /// Histogram buckets so far.
    Update { buckets: Vec<(String, u64)> },
    /// A rendered circuit or its failure.
    Circuit(CircuitResult),
    /// A command failed before producing a result.
    Error { title: String, message: String },
}

impl DisplayMessage {
    pub fn update(histogram: &Histogram) -> Self {
        DisplayMessage::Update {
            buckets: histogram.buckets(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        DisplayMessage::Error {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            DisplayMessage::Update { .. } => "update",
            DisplayMessage::Circuit(_) => "circuit",
            DisplayMessage::Error { .. } => "error",
        }
    }
}

/// Something that shows display messages.
pub trait DisplaySurface: Send {
    /// Show one message; later messages replace earlier ones.
    fn post(&mut self, message: &DisplayMessage) -> DispatchResult<()>;

    /// Called once when the owning panel disposes the surface.
    fn close(&mut self) {}
}

type SurfaceFactory = Box<dyn FnMut() -> DispatchResult<Box<dyn DisplaySurface>> + Send>;

/// An owned, lazily created display slot.
pub struct DisplayPanel {
    kind: &'static str,
    factory: SurfaceFactory,
    surface: Option<Box<dyn DisplaySurface>>,
    opened: usize,
}

impl DisplayPanel {
    /// A panel that creates its surface with `factory` on first post.
    pub fn new<F>(kind: &'static str, factory: F) -> Self
    where
        F: FnMut() -> DispatchResult<Box<dyn DisplaySurface>> + Send + 'static,
    {
        Self {
            kind,
            factory: Box::new(factory),
            surface: None,
            opened: 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        self.surface.is_some()
    }

    /// How many surfaces this panel has created.
    pub fn times_opened(&self) -> usize {
        self.opened
    }

    /// Post to the existing surface, creating it if absent.
    pub fn post(&mut self, message: &DisplayMessage) -> DispatchResult<()> {
        let surface = match &mut self.surface {
            Some(surface) => surface,
            slot @ None => {
                debug!("Opening {} panel", self.kind);
                self.opened += 1;
                slot.insert((self.factory)()?)
            }
        };
        surface.post(message)
    }

    /// Close the surface; the next post opens a new one.
    pub fn dispose(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            debug!("Disposing {} panel", self.kind);
            surface.close();
        }
    }
}

impl Drop for DisplayPanel {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DisplayPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayPanel")
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .field("opened", &self.opened)
            .finish()
    }
}

/// Writes each message as one JSON line.
pub struct JsonSurface<W> {
    writer: W,
}

impl<W: Write + Send> JsonSurface<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DisplaySurface for JsonSurface<W> {
    fn post(&mut self, message: &DisplayMessage) -> DispatchResult<()> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Records messages in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    log: Arc<Mutex<Vec<DisplayMessage>>>,
    closed: Arc<Mutex<usize>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything posted so far.
    pub fn messages(&self) -> Vec<DisplayMessage> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<DisplayMessage> {
        self.messages().pop()
    }

    /// How many times a surface sharing this log was closed.
    pub fn times_closed(&self) -> usize {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A panel whose surfaces all record into this log.
    pub fn panel(&self, kind: &'static str) -> DisplayPanel {
        let surface = self.clone();
        DisplayPanel::new(kind, move || Ok(Box::new(surface.clone()) as Box<dyn DisplaySurface>))
    }
}

impl DisplaySurface for MemorySurface {
    fn post(&mut self, message: &DisplayMessage) -> DispatchResult<()> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}
