//! The simulator as a worker [`Engine`].

use qbridge_proto::{
    Diagnostic, FaultKind, OperationInfo, Request, Response, RunEvent, Source, TargetProfile,
    WorkerFault,
};
use qbridge_worker::{CancelToken, Engine};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, warn};

use crate::circuit::build_circuit;
use crate::error::SimError;
use crate::profile::check_profile;
use crate::program::{Limits, OpId, Program, compile};
use crate::simulator::{ShotsEnd, Simulator};

/// Statevector engine serving check, run and circuit requests.
#[derive(Debug, Clone)]
pub struct SimEngine {
    limits: Limits,
    seed: Option<u64>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            seed: None,
        }
    }

    /// Create an engine with a custom qubit limit.
    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.limits.max_qubits = max_qubits;
        self
    }

    /// Create an engine with a custom cap on inlined operation size.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.limits.max_steps = max_steps;
        self
    }

    /// Fix the sampling seed so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_qubits(&self) -> usize {
        self.limits.max_qubits
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn check(&self, sources: &[Source], profile: TargetProfile) -> Response {
        let program = match compile(sources, &self.limits) {
            Ok(program) => program,
            Err(errors) => {
                return Response::Checked {
                    diagnostics: diagnostics(&errors),
                    operations: Vec::new(),
                };
            }
        };

        let violations: Vec<SimError> = program
            .operations()
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_entry)
            .flat_map(|(id, _)| check_profile(&program, id, profile))
            .collect();
        Response::Checked {
            diagnostics: diagnostics(&violations),
            operations: program.summaries(),
        }
    }

    fn run(
        &self,
        sources: &[Source],
        entry: Option<&str>,
        shots: u32,
        profile: TargetProfile,
        emit: &mut dyn FnMut(RunEvent) -> bool,
        cancel: &CancelToken,
    ) -> Result<Response, WorkerFault> {
        let program = self.compile(sources)?;
        let id = Self::select(&program, profile, |p| p.entry(entry))?;

        let sim = Simulator::new(&program, id);
        let mut rng = self.rng();
        info!(
            "Running '{}' on {} qubits for {} shots",
            program.operation(id).qualified_name(),
            sim.num_qubits(),
            shots
        );

        let end = sim.run(
            shots,
            &mut rng,
            || !cancel.is_cancelled(),
            |index, label| emit(RunEvent::new(label, index)),
        );
        match end {
            ShotsEnd::Completed(shots) => Ok(Response::RunComplete { shots }),
            ShotsEnd::Stopped(done) => {
                warn!("Run cancelled after {} of {} shots", done, shots);
                Err(WorkerFault::new(
                    FaultKind::Cancelled,
                    format!("Run cancelled after {done} of {shots} shots"),
                ))
            }
        }
    }

    fn circuit(
        &self,
        sources: &[Source],
        profile: TargetProfile,
        operation: Option<&OperationInfo>,
    ) -> Result<Response, WorkerFault> {
        let program = self.compile(sources)?;
        let id = Self::select(&program, profile, |p| match operation {
            Some(info) => p.find(info),
            None => p.entry(None),
        })?;
        let circuit = build_circuit(&program, id);
        debug!("Built circuit with {} operations", circuit.num_leaf_ops());
        Ok(Response::Circuit { circuit })
    }

    fn compile(&self, sources: &[Source]) -> Result<Program, WorkerFault> {
        compile(sources, &self.limits).map_err(|errors| {
            let noun = if errors.len() == 1 { "error" } else { "errors" };
            WorkerFault::new(
                FaultKind::Compile,
                format!("Compilation failed with {} {noun}", errors.len()),
            )
            .with_diagnostics(diagnostics(&errors))
        })
    }

    /// Pick an operation and check it against the target profile.
    fn select<F>(
        program: &Program,
        profile: TargetProfile,
        pick: F,
    ) -> Result<OpId, WorkerFault>
    where
        F: FnOnce(&Program) -> Result<OpId, SimError>,
    {
        let id = pick(program).map_err(|e| {
            WorkerFault::new(FaultKind::Compile, e.to_string())
                .with_diagnostics(vec![e.to_diagnostic()])
        })?;

        let violations = check_profile(program, id, profile);
        if let Some(first) = violations.first() {
            return Err(WorkerFault::new(FaultKind::Profile, first.to_string())
                .with_diagnostics(diagnostics(&violations)));
        }
        Ok(id)
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn diagnostics(errors: &[SimError]) -> Vec<Diagnostic> {
    errors.iter().map(SimError::to_diagnostic).collect()
}

impl Engine for SimEngine {
    fn name(&self) -> &str {
        "statevector"
    }

    #[instrument(skip_all, fields(kind = request.kind().as_str()))]
    fn execute(
        &self,
        request: Request,
        emit: &mut dyn FnMut(RunEvent) -> bool,
        cancel: &CancelToken,
    ) -> Response {
        let result = match &request {
            Request::Check { sources, profile } => Ok(self.check(sources, *profile)),
            Request::Run {
                sources,
                entry,
                shots,
                profile,
            } => self.run(sources, entry.as_deref(), *shots, *profile, emit, cancel),
            Request::Circuit {
                sources,
                profile,
                operation,
            } => self.circuit(sources, *profile, operation.as_ref()),
        };

        result.unwrap_or_else(|error| {
            debug!("Request failed: {}", error.message);
            Response::Failed { error }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(text: &str) -> Vec<Source> {
        vec![Source::new("main.qb", text)]
    }

    fn execute(engine: &SimEngine, request: Request) -> (Response, Vec<RunEvent>) {
        let mut events = Vec::new();
        let response = engine.execute(
            request,
            &mut |e| {
                events.push(e);
                true
            },
            &CancelToken::new(),
        );
        (response, events)
    }

    #[test]
    fn test_run_emits_one_event_per_shot() {
        let engine = SimEngine::new().with_seed(11);
        let (response, events) = execute(
            &engine,
            Request::Run {
                sources: sources("@entry operation A { x 1; measure 0; measure 1; }"),
                entry: None,
                shots: 5,
                profile: TargetProfile::Unrestricted,
            },
        );
        assert_eq!(response, Response::RunComplete { shots: 5 });
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.outcome_label == "01"));
        let indices: Vec<u32> = events.iter().map(|e| e.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_compile_failure_carries_diagnostics() {
        let engine = SimEngine::new();
        let (response, events) = execute(
            &engine,
            Request::Run {
                sources: sources("@entry operation A {\n foo 0;\n}"),
                entry: None,
                shots: 5,
                profile: TargetProfile::Unrestricted,
            },
        );
        assert!(events.is_empty());
        let Response::Failed { error } = response else {
            panic!("expected failure, got {response:?}");
        };
        assert_eq!(error.kind, FaultKind::Compile);
        assert_eq!(error.diagnostics[0].line, Some(2));
        assert_eq!(error.diagnostics[0].source.as_deref(), Some("main.qb"));
    }

    #[test]
    fn test_cancelled_before_first_shot() {
        let engine = SimEngine::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let response = engine.execute(
            Request::Run {
                sources: sources("@entry operation A { measure 0; }"),
                entry: None,
                shots: 3,
                profile: TargetProfile::Unrestricted,
            },
            &mut |_| panic!("no shot should run"),
            &cancel,
        );
        assert!(matches!(
            response,
            Response::Failed { error } if error.kind == FaultKind::Cancelled
        ));
    }

    #[test]
    fn test_closed_listener_stops_run() {
        let engine = SimEngine::new();
        let mut seen = 0;
        let response = engine.execute(
            Request::Run {
                sources: sources("@entry operation A { measure 0; }"),
                entry: None,
                shots: 100,
                profile: TargetProfile::Unrestricted,
            },
            &mut |_| {
                seen += 1;
                false
            },
            &CancelToken::new(),
        );
        assert_eq!(seen, 1);
        assert!(matches!(response, Response::Failed { .. }));
    }

    #[test]
    fn test_check_lists_operations_and_profile_problems() {
        let engine = SimEngine::new();
        let (response, _) = execute(
            &engine,
            Request::Check {
                sources: sources(
                    "namespace Demo;\n\
                     @entry operation Main { h 0; measure 0; x 0; }\n\
                     operation Helper { reset 1; }",
                ),
                profile: TargetProfile::Base,
            },
        );
        let Response::Checked {
            diagnostics,
            operations,
        } = response
        else {
            panic!("expected check reply");
        };
        assert_eq!(operations.len(), 2);
        assert!(operations[0].is_entry);
        assert_eq!(operations[1].num_qubits, 2);
        // Helper is not reachable from the entry point.
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("after it was measured"));
    }

    #[test]
    fn test_circuit_for_named_operation() {
        let engine = SimEngine::new();
        let (response, _) = execute(
            &engine,
            Request::Circuit {
                sources: sources("namespace Demo;\noperation Prep { h 0; h 1; }"),
                profile: TargetProfile::Unrestricted,
                operation: Some(OperationInfo {
                    namespace: Some("Demo".into()),
                    name: "Prep".into(),
                }),
            },
        );
        let Response::Circuit { circuit } = response else {
            panic!("expected circuit");
        };
        assert_eq!(circuit.qubits.len(), 2);
        assert_eq!(circuit.operations.len(), 2);
    }

    #[test]
    fn test_circuit_without_entry_fails() {
        let engine = SimEngine::new();
        let (response, _) = execute(
            &engine,
            Request::Circuit {
                sources: sources("operation Prep { h 0; }"),
                profile: TargetProfile::Unrestricted,
                operation: None,
            },
        );
        assert!(matches!(
            response,
            Response::Failed { error } if error.message.contains("No entry point")
        ));
    }

    #[test]
    fn test_qubit_limit() {
        let engine = SimEngine::new().with_max_qubits(2);
        assert_eq!(engine.max_qubits(), 2);
        let (response, _) = execute(
            &engine,
            Request::Check {
                sources: sources("operation Wide { h 2; }"),
                profile: TargetProfile::Unrestricted,
            },
        );
        let Response::Checked { diagnostics, .. } = response else {
            panic!("expected check reply");
        };
        assert!(diagnostics[0].message.contains("at most 2"));
    }

    #[test]
    fn test_step_limit_fails_run_before_sampling() {
        let engine = SimEngine::new().with_max_steps(10);
        assert_eq!(engine.limits().max_steps, 10);
        let (response, events) = execute(
            &engine,
            Request::Run {
                sources: sources(
                    "operation Four { h 0; h 0; h 0; h 0; }\n\
                     @entry operation A { call Four; call Four; measure 0; }",
                ),
                entry: None,
                shots: 5,
                profile: TargetProfile::Unrestricted,
            },
        );
        assert!(events.is_empty());
        let Response::Failed { error } = response else {
            panic!("expected failure");
        };
        assert_eq!(error.kind, FaultKind::Compile);
        assert!(error.diagnostics[0].message.contains("expands to 11 steps"));
    }
}
