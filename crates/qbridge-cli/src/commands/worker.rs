//! Worker command: serve the simulator on stdin/stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use qbridge_adapter_sim::SimEngine;
use qbridge_worker::serve;
use tokio::io::BufReader;
use tracing::info;

/// Execute the worker command. Stdout carries frames only; logs go to stderr.
pub async fn execute(max_qubits: usize, max_steps: usize, seed: Option<u64>) -> Result<()> {
    let mut engine = SimEngine::new()
        .with_max_qubits(max_qubits)
        .with_max_steps(max_steps);
    if let Some(seed) = seed {
        engine = engine.with_seed(seed);
    }

    let reader = BufReader::new(tokio::io::stdin());
    let served = serve(Arc::new(engine), reader, tokio::io::stdout())
        .await
        .context("Worker loop failed")?;
    info!("Worker exiting after {} requests", served);
    Ok(())
}
