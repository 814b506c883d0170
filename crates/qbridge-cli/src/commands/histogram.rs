//! Histogram command implementation.

use anyhow::Result;
use console::style;

use crate::config::BridgeConfig;
use crate::render::{ProgressSurface, print_histogram, spinner};

use super::common::{dispatcher, json_panel, load_document, terminal_panel, unused_panel};

/// Execute the histogram command.
pub async fn execute(
    config: &BridgeConfig,
    input: &str,
    related: &[String],
    entry: Option<String>,
    shots: Option<u32>,
    json: bool,
    seed: Option<u64>,
) -> Result<()> {
    let shots = shots.unwrap_or(config.default_shots);
    let document = load_document(input, related)?;

    if json {
        let mut dispatcher = dispatcher(
            config,
            seed,
            json_panel("histogram"),
            unused_panel("circuit"),
        )?;
        dispatcher.run_histogram(&document, entry, shots).await?;
        return Ok(());
    }

    println!(
        "{} Running {} ({} shots, {} profile)",
        style("→").cyan().bold(),
        style(input).green(),
        shots,
        style(config.profile).yellow()
    );

    let progress = spinner("Waiting for worker...");
    let panel = terminal_panel("histogram", &progress, move |bar| {
        ProgressSurface::new(bar, shots)
    });
    let mut dispatcher = dispatcher(config, seed, panel, unused_panel("circuit"))?;

    let result = dispatcher.run_histogram(&document, entry, shots).await;
    dispatcher.dispose_panels();
    progress.finish_and_clear();

    let histogram = result?;
    print_histogram(&histogram, shots);
    Ok(())
}
