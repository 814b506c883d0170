//! Replies and events sent from a worker to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::CircuitData;
use crate::error::{ProtoError, ProtoResult};
use crate::request::RequestKind;

/// One shot's outcome, streamed while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunEvent {
    /// Measurement results rendered as a label, e.g. `"01"`.
    pub outcome_label: String,
    /// Zero-based shot number.
    pub sequence_index: u32,
}

impl RunEvent {
    /// Create an event.
    pub fn new(outcome_label: impl Into<String>, sequence_index: u32) -> Self {
        Self {
            outcome_label: outcome_label.into(),
            sequence_index,
        }
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A compiler or runtime message tied to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    /// An error diagnostic without location.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            source: None,
            line: None,
        }
    }

    /// Attach a source name and line.
    pub fn at(mut self, source: impl Into<String>, line: usize) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self
    }

    /// Whether this diagnostic blocks execution.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.line) {
            (Some(src), Some(line)) => write!(f, "{src}:{line}: {}", self.message),
            (Some(src), None) => write!(f, "{src}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Operation declared in the sources, as listed by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    /// Marked `@entry`.
    pub is_entry: bool,
    /// Qubits touched, including through calls.
    pub num_qubits: usize,
}

/// Category of a worker-side failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The sources did not compile.
    Compile,
    /// Compilation succeeded but execution failed.
    Runtime,
    /// The program needs capabilities the target profile lacks.
    Profile,
    /// The request was cancelled inside the worker.
    Cancelled,
    /// The request itself was invalid.
    InvalidRequest,
}

/// Error payload returned by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFault {
    pub kind: FaultKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl WorkerFault {
    /// Create a fault without diagnostics.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Attach diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for diag in &self.diagnostics {
            write!(f, "\n  {diag}")?;
        }
        Ok(())
    }
}

/// A worker's reply to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// Answer to [`Request::Check`](crate::Request::Check).
    Checked {
        diagnostics: Vec<Diagnostic>,
        operations: Vec<OperationSummary>,
    },
    /// Answer to [`Request::Run`](crate::Request::Run) after the last event.
    RunComplete { shots: u32 },
    /// Answer to [`Request::Circuit`](crate::Request::Circuit).
    Circuit { circuit: CircuitData },
    /// Any request may fail.
    Failed { error: WorkerFault },
}

impl Response {
    /// Wire name of the reply kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Response::Checked { .. } => "checked",
            Response::RunComplete { .. } => "run_complete",
            Response::Circuit { .. } => "circuit",
            Response::Failed { .. } => "failed",
        }
    }

    /// Whether this reply is a valid answer to a request of `kind`.
    pub fn answers(&self, kind: RequestKind) -> bool {
        matches!(
            (self, kind),
            (Response::Failed { .. }, _)
                | (Response::Checked { .. }, RequestKind::Check)
                | (Response::RunComplete { .. }, RequestKind::Run)
                | (Response::Circuit { .. }, RequestKind::Circuit)
        )
    }

    /// Reject replies that do not answer `kind`.
    pub fn validate(self, kind: RequestKind) -> ProtoResult<Self> {
        if self.answers(kind) {
            Ok(self)
        } else {
            Err(ProtoError::UnexpectedReply {
                request: kind.as_str(),
                got: self.kind_name(),
            })
        }
    }
}
