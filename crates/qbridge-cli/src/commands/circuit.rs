//! Circuit command implementation.

use anyhow::Result;
use indicatif::ProgressBar;

use crate::config::BridgeConfig;
use crate::render::{CircuitSurface, spinner};

use super::common::{
    dispatcher, json_panel, load_document, parse_operation, terminal_panel, unused_panel,
};

/// Execute the circuit command.
///
/// A circuit that fails to build is displayed, then reported as an error.
pub async fn execute(
    config: &BridgeConfig,
    input: &str,
    related: &[String],
    operation: Option<&str>,
    json: bool,
    seed: Option<u64>,
) -> Result<()> {
    let document = load_document(input, related)?;
    let operation = operation.map(parse_operation);

    let progress = if json {
        ProgressBar::hidden()
    } else {
        spinner("Building circuit...")
    };
    let panel = if json {
        json_panel("circuit")
    } else {
        terminal_panel("circuit", &progress, CircuitSurface::new)
    };
    let mut dispatcher = dispatcher(config, seed, unused_panel("histogram"), panel)?;

    let result = dispatcher.render_circuit(&document, operation).await;
    dispatcher.dispose_panels();
    progress.finish_and_clear();

    if let Some(message) = result?.error_message() {
        anyhow::bail!("Circuit could not be built: {message}");
    }
    Ok(())
}
