//! Shot loop over a compiled program.

use std::time::Instant;

use rand::Rng;
use tracing::{debug, instrument};

use crate::program::{FlatStep, Instr, OpId, Program};
use crate::statevector::Statevector;

/// Label for a shot that measured nothing.
pub const EMPTY_OUTCOME: &str = "()";

/// How a shot loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotsEnd {
    /// Every requested shot ran.
    Completed(u32),
    /// Stopped before the next shot; carries the shots already run.
    Stopped(u32),
}

/// Runs one operation shot by shot.
pub struct Simulator<'a> {
    steps: Vec<FlatStep<'a>>,
    num_qubits: usize,
}

impl<'a> Simulator<'a> {
    pub fn new(program: &'a Program, id: OpId) -> Self {
        Self {
            steps: program.flatten(id),
            num_qubits: program.operation(id).num_qubits,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Run a single shot and return its outcome label.
    pub fn shot<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut sv = Statevector::new(self.num_qubits);
        let mut label = String::new();

        for step in &self.steps {
            match step.instr {
                Instr::Gate { gate, qubits } => sv.apply(*gate, qubits),
                Instr::Measure(q) => label.push(if sv.measure(*q, rng) { '1' } else { '0' }),
                Instr::Reset(q) => sv.reset(*q, rng),
                Instr::Call(_) => {}
            }
        }

        if label.is_empty() {
            EMPTY_OUTCOME.to_string()
        } else {
            label
        }
    }

    /// Run up to `shots` shots, handing each label to `on_shot`.
    ///
    /// `keep_going` is consulted before every shot; `on_shot` returning
    /// `false` stops the loop after that shot.
    #[instrument(skip_all, fields(qubits = self.num_qubits, shots = shots))]
    pub fn run<R, K, F>(&self, shots: u32, rng: &mut R, keep_going: K, mut on_shot: F) -> ShotsEnd
    where
        R: Rng + ?Sized,
        K: Fn() -> bool,
        F: FnMut(u32, String) -> bool,
    {
        let start = Instant::now();
        debug!("Starting simulation: {} steps", self.steps.len());

        for shot in 0..shots {
            if !keep_going() {
                debug!("Stopped after {} shots", shot);
                return ShotsEnd::Stopped(shot);
            }
            let label = self.shot(rng);
            if !on_shot(shot, label) {
                debug!("Listener went away after {} shots", shot + 1);
                return ShotsEnd::Stopped(shot + 1);
            }
            if shot > 0 && shot % 1000 == 0 {
                debug!("Completed {} shots", shot);
            }
        }

        debug!("Simulation completed in {:?}", start.elapsed());
        ShotsEnd::Completed(shots)
    }
}
