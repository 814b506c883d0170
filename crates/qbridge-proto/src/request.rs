//! Requests sent from the host to a worker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One document of program text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display name, usually the file name.
    pub name: String,
    /// Full program text.
    pub contents: String,
}

impl Source {
    /// Create a source from a name and its text.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Capability level the program is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetProfile {
    /// Straight-line programs: no reset, no reuse of a measured qubit.
    Base,
    /// Anything the engine can simulate.
    #[default]
    Unrestricted,
}

impl TargetProfile {
    /// Profile name as it appears in configuration and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetProfile::Base => "base",
            TargetProfile::Unrestricted => "unrestricted",
        }
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(TargetProfile::Base),
            "unrestricted" | "full" => Ok(TargetProfile::Unrestricted),
            other => Err(format!(
                "Unknown target profile: '{other}'. Available: base, unrestricted"
            )),
        }
    }
}

/// Selects an operation other than the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Namespace the operation is declared in, if the caller knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Operation name.
    pub name: String,
}

impl OperationInfo {
    /// Select an operation by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Qualified display name (`Namespace.Name` or `Name`).
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A request to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    /// Compile the sources and report diagnostics and operations.
    Check {
        sources: Vec<Source>,
        #[serde(default)]
        profile: TargetProfile,
    },
    /// Run the entry operation `shots` times, streaming one event per shot.
    Run {
        sources: Vec<Source>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<String>,
        shots: u32,
        #[serde(default)]
        profile: TargetProfile,
    },
    /// Build circuit-diagram data for the entry or a named operation.
    Circuit {
        sources: Vec<Source>,
        #[serde(default)]
        profile: TargetProfile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<OperationInfo>,
    },
}

/// Discriminant of a [`Request`], used to validate replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Check,
    Run,
    Circuit,
}

impl RequestKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Check => "check",
            RequestKind::Run => "run",
            RequestKind::Circuit => "circuit",
        }
    }
}

impl Request {
    /// The request's kind.
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Check { .. } => RequestKind::Check,
            Request::Run { .. } => RequestKind::Run,
            Request::Circuit { .. } => RequestKind::Circuit,
        }
    }

    /// Sources carried by the request.
    pub fn sources(&self) -> &[Source] {
        match self {
            Request::Check { sources, .. }
            | Request::Run { sources, .. }
            | Request::Circuit { sources, .. } => sources,
        }
    }

    /// Whether the worker streams run events while serving this request.
    pub fn streams_events(&self) -> bool {
        matches!(self, Request::Run { .. })
    }
}
