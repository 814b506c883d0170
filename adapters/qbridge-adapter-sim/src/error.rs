//! Error types for compiling and simulating programs.

use std::fmt;

use qbridge_proto::Diagnostic;
use thiserror::Error;

/// A position in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub source: String,
    pub line: usize,
}

impl Location {
    pub fn new(source: impl Into<String>, line: usize) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Errors that can occur while compiling or running a program.
///
/// Messages carry no location; [`SimError::location`] supplies it so the
/// error can become a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SimError {
    /// Lexer error (invalid token).
    #[error("{message}")]
    Lex { at: Location, message: String },

    /// Unexpected token.
    #[error("Expected {expected}, found '{found}'")]
    UnexpectedToken {
        at: Location,
        expected: String,
        found: String,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { file: String, expected: String },

    /// Gate name not in the gate table.
    #[error("Unknown gate '{gate}'")]
    UnknownGate { at: Location, gate: String },

    /// Wrong number of qubits for a gate.
    #[error("Gate '{gate}' expects {expected} qubits, got {got}")]
    WrongQubitCount {
        at: Location,
        gate: String,
        expected: usize,
        got: usize,
    },

    /// Wrong number of angle parameters for a gate.
    #[error("Gate '{gate}' expects {expected} parameters, got {got}")]
    WrongParameterCount {
        at: Location,
        gate: String,
        expected: usize,
        got: usize,
    },

    /// The same qubit appears twice in one gate.
    #[error("Qubit {qubit} is used more than once in '{gate}'")]
    DuplicateOperand {
        at: Location,
        gate: String,
        qubit: usize,
    },

    /// Two operations with the same qualified name.
    #[error("Operation '{name}' is declared more than once")]
    DuplicateOperation { at: Location, name: String },

    /// `call` names an operation that does not exist.
    #[error("Unknown operation '{name}'")]
    UnknownOperation { at: Location, name: String },

    /// An unqualified `call` matches operations in several namespaces.
    #[error("Operation name '{name}' is ambiguous: {candidates}")]
    AmbiguousOperation {
        at: Location,
        name: String,
        candidates: String,
    },

    /// Operations call each other in a cycle.
    #[error("Recursive call cycle: {cycle}")]
    CallCycle { at: Location, cycle: String },

    /// An operation needs more qubits than the simulator supports.
    #[error("Operation '{operation}' uses {qubits} qubits; at most {limit} are supported")]
    TooManyQubits {
        at: Location,
        operation: String,
        qubits: usize,
        limit: usize,
    },

    /// Inlining an operation would produce too many instructions.
    #[error("Operation '{operation}' expands to {steps} steps; at most {limit} are supported")]
    ProgramTooLarge {
        at: Location,
        operation: String,
        steps: usize,
        limit: usize,
    },

    /// Calls are nested too deeply.
    #[error("Operation '{operation}' nests calls {depth} deep; at most {limit} are supported")]
    CallTooDeep {
        at: Location,
        operation: String,
        depth: usize,
        limit: usize,
    },

    /// The program uses something the target profile does not allow.
    #[error("{message} (not supported by the {profile} profile)")]
    ProfileViolation {
        at: Location,
        profile: String,
        message: String,
    },

    /// No `@entry` operation and none named in the request.
    #[error("No entry point: mark one operation with @entry")]
    NoEntryPoint,

    /// More than one `@entry` operation and none named in the request.
    #[error("Multiple entry points: {0}")]
    AmbiguousEntryPoint(String),

    /// The requested operation does not exist.
    #[error("Operation '{0}' not found")]
    OperationNotFound(String),

    /// The requested name matches operations in several namespaces.
    #[error("Operation name '{name}' is ambiguous: {candidates}")]
    AmbiguousName { name: String, candidates: String },
}

impl SimError {
    /// Where the error was found, if it belongs to a source line.
    pub fn location(&self) -> Option<&Location> {
        match self {
            SimError::Lex { at, .. }
            | SimError::UnexpectedToken { at, .. }
            | SimError::UnknownGate { at, .. }
            | SimError::WrongQubitCount { at, .. }
            | SimError::WrongParameterCount { at, .. }
            | SimError::DuplicateOperand { at, .. }
            | SimError::DuplicateOperation { at, .. }
            | SimError::UnknownOperation { at, .. }
            | SimError::AmbiguousOperation { at, .. }
            | SimError::CallCycle { at, .. }
            | SimError::TooManyQubits { at, .. }
            | SimError::ProgramTooLarge { at, .. }
            | SimError::CallTooDeep { at, .. }
            | SimError::ProfileViolation { at, .. } => Some(at),
            SimError::UnexpectedEof { .. }
            | SimError::NoEntryPoint
            | SimError::AmbiguousEntryPoint(_)
            | SimError::OperationNotFound(_)
            | SimError::AmbiguousName { .. } => None,
        }
    }

    pub fn is_profile_violation(&self) -> bool {
        matches!(self, SimError::ProfileViolation { .. })
    }

    /// Convert to a wire diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match (self, self.location()) {
            (_, Some(at)) => diag.at(&at.source, at.line),
            (SimError::UnexpectedEof { file, .. }, None) => Diagnostic {
                source: Some(file.clone()),
                ..diag
            },
            _ => diag,
        }
    }
}

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;
