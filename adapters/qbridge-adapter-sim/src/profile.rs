//! Target profile checks.
//!
//! Checks run over the flattened instruction stream, so a violation inside
//! a callee is reported at the callee's line. A callee inlined twice
//! reports each violation once.

use qbridge_proto::TargetProfile;

use crate::error::SimError;
use crate::program::{Instr, OpId, Program};

/// Check that `id` only uses what `profile` allows.
pub fn check_profile(program: &Program, id: OpId, profile: TargetProfile) -> Vec<SimError> {
    match profile {
        TargetProfile::Unrestricted => Vec::new(),
        TargetProfile::Base => check_base(program, id),
    }
}

fn check_base(program: &Program, id: OpId) -> Vec<SimError> {
    let num_qubits = program.operation(id).num_qubits;
    let mut measured = vec![false; num_qubits];
    let mut errors: Vec<SimError> = Vec::new();

    for step in program.flatten(id) {
        let message = match step.instr {
            Instr::Reset(q) => Some(format!("Reset of qubit {q}")),
            Instr::Measure(q) if measured[*q] => {
                Some(format!("Qubit {q} is measured more than once"))
            }
            Instr::Measure(q) => {
                measured[*q] = true;
                None
            }
            Instr::Gate { qubits, .. } => qubits
                .iter()
                .find(|&&q| measured[q])
                .map(|q| format!("Gate on qubit {q} after it was measured")),
            Instr::Call(_) => None,
        };

        if let Some(message) = message {
            let error = SimError::ProfileViolation {
                at: step.location(),
                profile: TargetProfile::Base.as_str().to_string(),
                message,
            };
            if !errors.contains(&error) {
                errors.push(error);
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Limits, compile};
    use qbridge_proto::Source;

    fn base_errors(text: &str) -> Vec<SimError> {
        let program = compile(&[Source::new("p.qb", text)], &Limits::default()).unwrap();
        let id = program.entry(None).unwrap();
        check_profile(&program, id, TargetProfile::Base)
    }

    #[test]
    fn test_bell_is_base_compatible() {
        let errors =
            base_errors("@entry operation Bell { h 0; cx 0, 1; measure 0; measure 1; }");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_reset_rejected() {
        let errors = base_errors("@entry operation A {\n h 0;\n reset 0;\n}");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_profile_violation());
        assert_eq!(errors[0].location().map(|l| l.line), Some(3));
        assert!(errors[0].to_string().contains("base profile"));
    }

    #[test]
    fn test_gate_after_measure_rejected() {
        let errors = base_errors("@entry operation A {\n measure 0;\n cx 1, 0;\n h 1;\n}");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("qubit 0 after it was measured"));
    }

    #[test]
    fn test_callee_violation_reported_once() {
        let errors = base_errors(
            "operation Clear {\n reset 0;\n}\n\
             @entry operation A { call Clear; call Clear; }",
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location().map(|l| l.line), Some(2));
    }

    #[test]
    fn test_unrestricted_allows_everything() {
        let program = compile(
            &[Source::new("p.qb", "@entry operation A { measure 0; reset 0; h 0; }")],
            &Limits::default(),
        )
        .unwrap();
        let id = program.entry(None).unwrap();
        assert!(check_profile(&program, id, TargetProfile::Unrestricted).is_empty());
    }
}
