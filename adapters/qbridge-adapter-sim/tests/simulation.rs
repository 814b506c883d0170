//! Simulator engine behind the bridge.

use std::sync::Arc;

use qbridge_adapter_sim::SimEngine;
use qbridge_dispatch::{
    CircuitOutcome, CommandDispatcher, DispatchConfig, DispatchError, DisplayMessage, Document,
    MemorySurface, RefreshPolicy,
};
use qbridge_proto::{
    FaultKind, OperationInfo, Request, Response, RunEvent, Source, TargetProfile, WorkerFault,
};
use qbridge_worker::{CancelToken, Engine, LocalSpawner, WorkerPool};

const BELL: &str = "namespace Demo;

@entry
operation Bell {
    h 0;
    cx 0, 1;
    measure 0;
    measure 1;
}

operation Prepare {
    ry(pi / 3) 0;
    call Bell;
}
";

fn run(
    engine: &SimEngine,
    sources: Vec<Source>,
    shots: u32,
    profile: TargetProfile,
) -> (Response, Vec<RunEvent>) {
    let mut events = Vec::new();
    let response = engine.execute(
        Request::Run {
            sources,
            entry: None,
            shots,
            profile,
        },
        &mut |event| {
            events.push(event);
            true
        },
        &CancelToken::new(),
    );
    (response, events)
}

fn failure(response: Response) -> WorkerFault {
    match response {
        Response::Failed { error } => error,
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn test_bell_outcomes_are_correlated() {
    let engine = SimEngine::new().with_seed(42);
    let (response, events) = run(&engine, vec![Source::new("bell.qb", BELL)], 500, TargetProfile::Base);

    assert_eq!(response, Response::RunComplete { shots: 500 });
    assert_eq!(events.len(), 500);
    assert!(events.iter().all(|e| e.outcome_label == "00" || e.outcome_label == "11"));

    let ones = events.iter().filter(|e| e.outcome_label == "11").count();
    assert!((150..350).contains(&ones), "unbalanced Bell sampling: {ones}");
}

#[test]
fn test_seeded_runs_repeat() {
    let engine = SimEngine::new().with_seed(7);
    let (_, first) = run(&engine, vec![Source::new("bell.qb", BELL)], 50, TargetProfile::Unrestricted);
    let (_, second) = run(&engine, vec![Source::new("bell.qb", BELL)], 50, TargetProfile::Unrestricted);
    assert_eq!(first, second);
}

#[test]
fn test_base_profile_rejects_reset() {
    let text = "@entry operation A {\n    h 0;\n    reset 0;\n    measure 0;\n}";
    let engine = SimEngine::new();

    let error = failure(run(&engine, vec![Source::new("reset.qb", text)], 10, TargetProfile::Base).0);
    assert_eq!(error.kind, FaultKind::Profile);
    assert_eq!(error.diagnostics.len(), 1);
    assert_eq!(error.diagnostics[0].line, Some(3));

    let (response, events) = run(&engine, vec![Source::new("reset.qb", text)], 10, TargetProfile::Unrestricted);
    assert_eq!(response, Response::RunComplete { shots: 10 });
    assert!(events.iter().all(|e| e.outcome_label == "0"));
}

#[test]
fn test_base_profile_rejects_gate_after_measurement() {
    let text = "@entry operation A {\n    measure 0;\n    x 0;\n    measure 1;\n}";
    let error = failure(run(&SimEngine::new(), vec![Source::new("m.qb", text)], 1, TargetProfile::Base).0);
    assert_eq!(error.kind, FaultKind::Profile);
    assert!(error.message.contains("not supported by the base profile"));
}

#[test]
fn test_call_cycles_reported_as_diagnostics() {
    let engine = SimEngine::new();
    let response = engine.execute(
        Request::Check {
            sources: vec![Source::new(
                "loop.qb",
                "operation Ping {\n    call Pong;\n}\noperation Pong {\n    call Ping;\n}",
            )],
            profile: TargetProfile::Unrestricted,
        },
        &mut |_| true,
        &CancelToken::new(),
    );
    let Response::Checked { diagnostics, operations } = response else {
        panic!("expected check reply");
    };
    assert!(operations.is_empty());
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("Ping -> Pong -> Ping"));
    assert_eq!(diagnostics[0].line, Some(5));
}

#[test]
fn test_entry_named_in_request() {
    let engine = SimEngine::new().with_seed(1);
    let mut labels = Vec::new();
    let response = engine.execute(
        Request::Run {
            sources: vec![Source::new("bell.qb", BELL)],
            entry: Some("Demo.Prepare".into()),
            shots: 20,
            profile: TargetProfile::Unrestricted,
        },
        &mut |event| {
            labels.push(event.outcome_label);
            true
        },
        &CancelToken::new(),
    );
    assert_eq!(response, Response::RunComplete { shots: 20 });
    assert!(labels.iter().all(|l| l.len() == 2));
}

fn sim_dispatcher() -> (CommandDispatcher, MemorySurface, MemorySurface) {
    let spawner = LocalSpawner::new(Arc::new(SimEngine::new().with_seed(5)));
    let histogram = MemorySurface::new();
    let circuit = MemorySurface::new();
    let dispatcher = CommandDispatcher::new(
        WorkerPool::new(Arc::new(spawner), 1),
        histogram.panel("histogram"),
        circuit.panel("circuit"),
    )
    .with_config(DispatchConfig {
        refresh: RefreshPolicy::default(),
        event_buffer: 16,
        profile: TargetProfile::Base,
    });
    (dispatcher, histogram, circuit)
}

#[tokio::test]
async fn test_histogram_through_dispatcher() {
    let (mut dispatcher, histogram, _) = sim_dispatcher();
    let doc = Document::new("demo/bell.qb", BELL);

    let hist = dispatcher.run_histogram(&doc, None, 1000).await.unwrap();

    assert_eq!(hist.total(), 1000);
    assert!(hist.iter().all(|(label, _)| label == "00" || label == "11"));
    match histogram.last() {
        Some(DisplayMessage::Update { buckets }) => {
            assert_eq!(buckets.iter().map(|(_, c)| c).sum::<u64>(), 1000);
        }
        other => panic!("unexpected final message {other:?}"),
    }
}

#[tokio::test]
async fn test_compile_error_through_dispatcher() {
    let (mut dispatcher, histogram, _) = sim_dispatcher();
    let doc = Document::new("demo/bad.qb", "@entry operation A {\n    hh 0;\n}");

    let err = dispatcher.run_histogram(&doc, None, 10).await.unwrap_err();
    let DispatchError::WorkerFailure(fault) = err else {
        panic!("expected worker failure, got {err:?}");
    };
    assert_eq!(fault.kind, FaultKind::Compile);
    assert!(fault.to_string().contains("demo/bad.qb:2: Unknown gate 'hh'"));
    assert!(matches!(
        histogram.last(),
        Some(DisplayMessage::Error { title, .. }) if title == "bad histogram"
    ));
    assert_eq!(dispatcher.pool().available(), 1);
}

#[tokio::test]
async fn test_circuit_through_dispatcher() {
    let (mut dispatcher, _, circuit_panel) = sim_dispatcher();
    let doc = Document::new("demo/bell.qb", BELL);

    let result = dispatcher
        .render_circuit(
            &doc,
            Some(OperationInfo {
                namespace: Some("Demo".into()),
                name: "Prepare".into(),
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.title, "Demo.Prepare");
    assert_eq!(result.subtitle, "demo/bell.qb (base profile)");
    let CircuitOutcome::Circuit(data) = &result.outcome else {
        panic!("expected circuit, got {:?}", result.outcome);
    };
    assert_eq!(data.operations.len(), 2);
    assert_eq!(data.operations[1].gate, "Bell");
    assert_eq!(data.operations[1].children.len(), 4);
    assert_eq!(circuit_panel.messages().len(), 1);
}

#[tokio::test]
async fn test_check_through_dispatcher() {
    let (mut dispatcher, _, _) = sim_dispatcher();
    let doc = Document::new("demo/bell.qb", BELL);

    let report = dispatcher.check(&doc).await.unwrap();
    assert!(!report.has_errors());
    let names: Vec<String> = report.lenses().iter().map(ToString::to_string).collect();
    assert_eq!(
        names,
        vec![
            "Demo.Bell [Run]",
            "Demo.Bell [Histogram]",
            "Demo.Bell [Circuit]",
            "Demo.Prepare [Circuit]",
        ]
    );
}
