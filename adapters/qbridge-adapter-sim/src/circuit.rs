//! Circuit diagram data for an operation.

use qbridge_proto::{CircuitData, CircuitOp, QubitWire, Register};

use crate::program::{Gate, Instr, OpId, Program};

/// Build diagram data for `id`.
///
/// Calls become grouped operations whose children are the callee's
/// operations. Each measurement writes the next result slot of its wire.
pub fn build_circuit(program: &Program, id: OpId) -> CircuitData {
    let num_qubits = program.operation(id).num_qubits;
    let mut builder = CircuitBuilder {
        program,
        results: vec![0; num_qubits],
    };
    let operations = builder.ops_for(id);

    CircuitData {
        qubits: builder
            .results
            .iter()
            .enumerate()
            .map(|(id, &num_results)| QubitWire { id, num_results })
            .collect(),
        operations,
    }
}

struct CircuitBuilder<'a> {
    program: &'a Program,
    results: Vec<usize>,
}

impl CircuitBuilder<'_> {
    fn ops_for(&mut self, id: OpId) -> Vec<CircuitOp> {
        let program = self.program;
        program
            .operation(id)
            .body
            .iter()
            .map(|step| self.op(&step.instr))
            .collect()
    }

    fn op(&mut self, instr: &Instr) -> CircuitOp {
        match instr {
            Instr::Gate { gate, qubits } => gate_op(*gate, qubits),
            Instr::Measure(q) => {
                let slot = self.results[*q];
                self.results[*q] += 1;
                CircuitOp {
                    gate: "Measure".to_string(),
                    display_args: None,
                    is_controlled: false,
                    is_measurement: true,
                    controls: vec![Register::qubit(*q)],
                    targets: vec![Register::classical(*q, slot)],
                    children: Vec::new(),
                }
            }
            Instr::Reset(q) => CircuitOp::gate("|0〉", vec![Register::qubit(*q)]),
            Instr::Call(callee) => {
                let children = self.ops_for(*callee);
                let operation = self.program.operation(*callee);
                let mut group = CircuitOp::gate(
                    operation.name.clone(),
                    operation.touched.iter().copied().map(Register::qubit).collect(),
                );
                group.children = children;
                group
            }
        }
    }
}

fn gate_op(gate: Gate, qubits: &[usize]) -> CircuitOp {
    let (controls, targets) = qubits.split_at(gate.num_controls());
    CircuitOp {
        gate: gate.label().to_string(),
        display_args: gate.angle().map(|a| format!("{a:.4}")),
        is_controlled: !controls.is_empty(),
        is_measurement: false,
        controls: controls.iter().copied().map(Register::qubit).collect(),
        targets: targets.iter().copied().map(Register::qubit).collect(),
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Limits, compile};
    use qbridge_proto::{RegisterKind, Source};

    fn circuit(text: &str) -> CircuitData {
        let program = compile(&[Source::new("c.qb", text)], &Limits::default()).unwrap();
        build_circuit(&program, program.entry(None).unwrap())
    }

    #[test]
    fn test_bell_diagram() {
        let data = circuit("@entry operation Bell { h 0; cx 0, 1; measure 0; measure 1; }");
        assert_eq!(data.qubits.len(), 2);
        assert!(data.qubits.iter().all(|w| w.num_results == 1));
        assert_eq!(data.operations.len(), 4);

        let cx = &data.operations[1];
        assert_eq!(cx.gate, "X");
        assert!(cx.is_controlled);
        assert_eq!(cx.controls, vec![Register::qubit(0)]);
        assert_eq!(cx.targets, vec![Register::qubit(1)]);

        let m = &data.operations[3];
        assert!(m.is_measurement);
        assert_eq!(m.targets[0].kind, RegisterKind::Classical);
        assert_eq!(m.targets[0].q_id, 1);
    }

    #[test]
    fn test_call_becomes_group() {
        let data = circuit(
            "operation Prep { h 1; cz 1, 3; }\n\
             @entry operation Main { x 0; call Prep; measure 3; measure 3; }",
        );
        assert_eq!(data.qubits.len(), 4);
        assert_eq!(data.qubits[3].num_results, 2);
        assert_eq!(data.operations[3].targets[0].c_id, Some(1));

        let group = &data.operations[1];
        assert_eq!(group.gate, "Prep");
        assert_eq!(group.targets, vec![Register::qubit(1), Register::qubit(3)]);
        assert_eq!(group.children.len(), 2);
        assert_eq!(data.num_leaf_ops(), 5);
    }

    #[test]
    fn test_nested_group_targets_every_touched_qubit() {
        let data = circuit(
            "operation Prep { h 4; }\n\
             operation Wrap { call Prep; reset 2; }\n\
             @entry operation Main { call Wrap; }",
        );
        let wrap = &data.operations[0];
        assert_eq!(wrap.targets, vec![Register::qubit(2), Register::qubit(4)]);
        assert_eq!(wrap.children[0].gate, "Prep");
        assert_eq!(wrap.children[0].targets, vec![Register::qubit(4)]);
    }

    #[test]
    fn test_angle_display() {
        let data = circuit("@entry operation A { rz(pi / 2) 0; }");
        assert_eq!(data.operations[0].display_args.as_deref(), Some("1.5708"));
        assert_eq!(data.qubits[0].num_results, 0);
    }
}
