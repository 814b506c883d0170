//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use qbridge_adapter_sim::SimEngine;
use qbridge_dispatch::{CommandDispatcher, DisplayPanel, DisplaySurface, Document, JsonSurface};
use qbridge_proto::{OperationInfo, Source};
use qbridge_worker::{LocalSpawner, ProcessSpawner, WorkerPool, WorkerSpawner};
use tracing::debug;

use crate::config::{BridgeConfig, WorkerMode};

/// Load the document a command acts on, plus related sources.
pub fn load_document(path: &str, related: &[String]) -> Result<Document> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;

    let related = related
        .iter()
        .map(|p| {
            fs::read_to_string(p)
                .map(|contents| Source::new(p.as_str(), contents))
                .with_context(|| format!("Failed to read file: {p}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Document::new(path, text).with_related(related))
}

/// `Name` or `Ns.Name`.
pub fn parse_operation(name: &str) -> OperationInfo {
    match name.rsplit_once('.') {
        Some((ns, name)) => OperationInfo {
            namespace: Some(ns.to_string()),
            name: name.to_string(),
        },
        None => OperationInfo::named(name),
    }
}

/// Spawner for the configured worker mode.
pub fn spawner(config: &BridgeConfig, seed: Option<u64>) -> Result<Arc<dyn WorkerSpawner>> {
    let spawner: Arc<dyn WorkerSpawner> = match config.worker.mode {
        WorkerMode::Local => {
            let mut engine = SimEngine::new()
                .with_max_qubits(config.worker.max_qubits)
                .with_max_steps(config.worker.max_steps);
            if let Some(seed) = seed {
                engine = engine.with_seed(seed);
            }
            Arc::new(LocalSpawner::new(Arc::new(engine)).with_event_buffer(config.worker.event_buffer))
        }
        WorkerMode::Process => {
            let program = match &config.worker.program {
                Some(program) => program.clone(),
                None => std::env::current_exe().context("Failed to locate the qbridge binary")?,
            };
            let mut args = vec![
                "worker".to_string(),
                "--max-qubits".to_string(),
                config.worker.max_qubits.to_string(),
                "--max-steps".to_string(),
                config.worker.max_steps.to_string(),
            ];
            if let Some(seed) = seed {
                args.push("--seed".to_string());
                args.push(seed.to_string());
            }
            Arc::new(ProcessSpawner::new(program, args))
        }
    };
    debug!("Workers: {}", spawner.describe());
    Ok(spawner)
}

/// Dispatcher with the given panels and the configured pool.
pub fn dispatcher(
    config: &BridgeConfig,
    seed: Option<u64>,
    histogram_panel: DisplayPanel,
    circuit_panel: DisplayPanel,
) -> Result<CommandDispatcher> {
    let pool = WorkerPool::new(spawner(config, seed)?, config.worker.max_workers)
        .with_timeout(config.timeout());
    Ok(CommandDispatcher::new(pool, histogram_panel, circuit_panel)
        .with_config(config.dispatch_config()))
}

/// A panel that writes JSON lines to stdout.
pub fn json_panel(kind: &'static str) -> DisplayPanel {
    DisplayPanel::new(kind, || {
        Ok(Box::new(JsonSurface::new(std::io::stdout())) as Box<dyn DisplaySurface>)
    })
}

/// A panel that never opens; for commands that do not use it.
pub fn unused_panel(kind: &'static str) -> DisplayPanel {
    DisplayPanel::new(kind, move || {
        Err(qbridge_dispatch::DispatchError::Display(format!(
            "the {kind} panel is not available for this command"
        )))
    })
}

/// A panel backed by a terminal surface sharing `spinner`.
pub fn terminal_panel<S, F>(kind: &'static str, spinner: &ProgressBar, make: F) -> DisplayPanel
where
    S: DisplaySurface + 'static,
    F: Fn(ProgressBar) -> S + Send + 'static,
{
    let spinner = spinner.clone();
    DisplayPanel::new(kind, move || {
        Ok(Box::new(make(spinner.clone())) as Box<dyn DisplaySurface>)
    })
}
