//! Circuit-diagram data.
//!
//! The shape consumed by circuit renderers: one wire per qubit and a tree of
//! operations. Grouped operations (calls) carry their body in `children`.

use serde::{Deserialize, Serialize};

/// Register kind referenced by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    Qubit,
    Classical,
}

/// A qubit wire, or a classical result slot hanging off one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub q_id: usize,
    #[serde(rename = "type")]
    pub kind: RegisterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_id: Option<usize>,
}

impl Register {
    /// A qubit register.
    pub fn qubit(q_id: usize) -> Self {
        Self {
            q_id,
            kind: RegisterKind::Qubit,
            c_id: None,
        }
    }

    /// The `c_id`-th classical result measured from qubit `q_id`.
    pub fn classical(q_id: usize, c_id: usize) -> Self {
        Self {
            q_id,
            kind: RegisterKind::Classical,
            c_id: Some(c_id),
        }
    }
}

/// A single box on the diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitOp {
    pub gate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_args: Option<String>,
    #[serde(default)]
    pub is_controlled: bool,
    #[serde(default)]
    pub is_measurement: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Register>,
    pub targets: Vec<Register>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CircuitOp>,
}

impl CircuitOp {
    /// An uncontrolled gate on `targets`.
    pub fn gate(name: impl Into<String>, targets: Vec<Register>) -> Self {
        Self {
            gate: name.into(),
            display_args: None,
            is_controlled: false,
            is_measurement: false,
            controls: Vec::new(),
            targets,
            children: Vec::new(),
        }
    }

    /// Number of leaf operations under (and including) this box.
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(CircuitOp::leaf_count).sum()
        }
    }
}

/// A qubit wire and how many classical results it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QubitWire {
    pub id: usize,
    pub num_results: usize,
}

/// Complete diagram data for one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitData {
    pub qubits: Vec<QubitWire>,
    pub operations: Vec<CircuitOp>,
}

impl CircuitData {
    /// Total leaf operations in the diagram.
    pub fn num_leaf_ops(&self) -> usize {
        self.operations.iter().map(CircuitOp::leaf_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_serialization() {
        let json = serde_json::to_value(Register::classical(1, 0)).unwrap();
        assert_eq!(json, serde_json::json!({"qId": 1, "type": "classical", "cId": 0}));

        let json = serde_json::to_value(Register::qubit(2)).unwrap();
        assert_eq!(json, serde_json::json!({"qId": 2, "type": "qubit"}));
    }

    #[test]
    fn test_op_camel_case() {
        let mut op = CircuitOp::gate("rx", vec![Register::qubit(0)]);
        op.display_args = Some("1.5708".into());
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["displayArgs"], "1.5708");
        assert_eq!(json["isControlled"], false);
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_leaf_count_through_groups() {
        let mut group = CircuitOp::gate("Bell", vec![Register::qubit(0), Register::qubit(1)]);
        group.children = vec![
            CircuitOp::gate("H", vec![Register::qubit(0)]),
            CircuitOp::gate("X", vec![Register::qubit(1)]),
        ];
        let data = CircuitData {
            qubits: vec![],
            operations: vec![group, CircuitOp::gate("Z", vec![Register::qubit(0)])],
        };
        assert_eq!(data.num_leaf_ops(), 3);
    }
}
