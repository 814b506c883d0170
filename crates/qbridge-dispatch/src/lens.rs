//! Per-operation actions offered for a document.
//!
//! Entry operations can be run, sampled into a histogram, or drawn. Other
//! operations that touch qubits can only be drawn, by name.

use std::fmt;

use qbridge_proto::{OperationInfo, OperationSummary};

/// Command behind a lens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LensCommand {
    Run,
    Histogram,
    Circuit,
    OperationCircuit(OperationInfo),
}

impl LensCommand {
    pub fn title(&self) -> &'static str {
        match self {
            LensCommand::Run => "Run",
            LensCommand::Histogram => "Histogram",
            LensCommand::Circuit | LensCommand::OperationCircuit(_) => "Circuit",
        }
    }
}

/// An action attached to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLens {
    /// Operation the lens is attached to.
    pub operation: String,
    pub command: LensCommand,
}

impl fmt::Display for CodeLens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.operation, self.command.title())
    }
}

/// Lenses for every operation in a check result, in declaration order.
pub fn code_lenses(operations: &[OperationSummary]) -> Vec<CodeLens> {
    operations
        .iter()
        .flat_map(|op| {
            let info = OperationInfo {
                namespace: op.namespace.clone(),
                name: op.name.clone(),
            };
            let label = info.qualified();
            let commands = if op.is_entry {
                vec![LensCommand::Run, LensCommand::Histogram, LensCommand::Circuit]
            } else if op.num_qubits > 0 {
                vec![LensCommand::OperationCircuit(info)]
            } else {
                vec![]
            };
            commands.into_iter().map(move |command| CodeLens {
                operation: label.clone(),
                command,
            })
        })
        .collect()
}
