//! Property tests over randomly generated gate lists.

use proptest::prelude::*;
use qbridge_adapter_sim::{EMPTY_OUTCOME, Limits, Simulator, build_circuit, compile};
use qbridge_proto::Source;
use rand::SeedableRng;
use rand::rngs::StdRng;

const NUM_QUBITS: usize = 4;

fn statement() -> impl Strategy<Value = String> {
    let q = 0..NUM_QUBITS;
    prop_oneof![
        (prop::sample::select(vec!["h", "x", "y", "z", "s", "t", "sdg", "tdg"]), q.clone())
            .prop_map(|(g, a)| format!("{g} {a};")),
        (prop::sample::select(vec!["rx", "ry", "rz", "p"]), -6.3f64..6.3, q.clone())
            .prop_map(|(g, theta, a)| format!("{g}({theta}) {a};")),
        (prop::sample::select(vec!["cx", "cz", "swap"]), q.clone(), q.clone())
            .prop_filter("distinct operands", |(_, a, b)| a != b)
            .prop_map(|(g, a, b)| format!("{g} {a}, {b};")),
        q.clone().prop_map(|a| format!("measure {a};")),
        q.prop_map(|a| format!("reset {a};")),
    ]
}

proptest! {
    /// One character per measurement, each a 0 or 1.
    #[test]
    fn label_has_one_bit_per_measurement(
        body in prop::collection::vec(statement(), 1..40),
        seed in any::<u64>(),
    ) {
        let text = format!("@entry operation Main {{ {} }}", body.join(" "));
        let program = compile(&[Source::new("gen.qb", text)], &Limits::default()).unwrap();
        let sim = Simulator::new(&program, program.entry(None).unwrap());

        let measurements = body.iter().filter(|s| s.starts_with("measure")).count();
        let label = sim.shot(&mut StdRng::seed_from_u64(seed));
        if measurements == 0 {
            prop_assert_eq!(label, EMPTY_OUTCOME);
        } else {
            prop_assert_eq!(label.len(), measurements);
            prop_assert!(label.chars().all(|c| c == '0' || c == '1'));
        }
    }

    /// The diagram has one leaf per statement and one result slot per
    /// measurement.
    #[test]
    fn circuit_mirrors_statements(body in prop::collection::vec(statement(), 1..40)) {
        let text = format!("@entry operation Main {{ {} }}", body.join(" "));
        let program = compile(&[Source::new("gen.qb", text)], &Limits::default()).unwrap();
        let data = build_circuit(&program, program.entry(None).unwrap());

        let measurements = body.iter().filter(|s| s.starts_with("measure")).count();
        prop_assert_eq!(data.num_leaf_ops(), body.len());
        prop_assert_eq!(data.qubits.iter().map(|w| w.num_results).sum::<usize>(), measurements);
    }
}
