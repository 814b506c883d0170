//! Check command implementation.

use anyhow::Result;
use console::style;
use qbridge_proto::Severity;
use serde_json::json;

use crate::config::BridgeConfig;
use crate::render::{ProgressSurface, spinner};

use super::common::{dispatcher, json_panel, load_document, terminal_panel, unused_panel};

/// Execute the check command: diagnostics, then the available actions.
pub async fn execute(
    config: &BridgeConfig,
    input: &str,
    related: &[String],
    json: bool,
) -> Result<()> {
    let document = load_document(input, related)?;
    let progress = spinner(format!("Checking {input}..."));
    // Worker failures are reported on the histogram panel.
    let panel = if json {
        json_panel("histogram")
    } else {
        terminal_panel("histogram", &progress, |bar| ProgressSurface::new(bar, 0))
    };
    let mut dispatcher = dispatcher(config, None, panel, unused_panel("circuit"))?;

    let result = dispatcher.check(&document).await;
    dispatcher.dispose_panels();
    progress.finish_and_clear();
    let report = result?;

    if json {
        let lenses: Vec<String> = report.lenses().iter().map(ToString::to_string).collect();
        let out = json!({
            "diagnostics": report.diagnostics,
            "operations": report.operations,
            "lenses": lenses,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for diag in &report.diagnostics {
            let tag = match diag.severity {
                Severity::Error => style("error").red().bold(),
                Severity::Warning => style("warning").yellow().bold(),
            };
            println!("{tag}: {diag}");
        }

        if report.operations.is_empty() {
            println!("No operations found");
        } else {
            println!("{}", style("Operations:").bold());
            for op in &report.operations {
                let name = match &op.namespace {
                    Some(ns) => format!("{ns}.{}", op.name),
                    None => op.name.clone(),
                };
                let entry = if op.is_entry { " (entry)" } else { "" };
                println!(
                    "  {:<28} {:>2} qubits{}",
                    style(name).cyan(),
                    op.num_qubits,
                    style(entry).green()
                );
            }
            println!("{}", style("Actions:").bold());
            for lens in report.lenses() {
                println!("  {lens}");
            }
        }
    }

    let errors = report.diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        anyhow::bail!("{input}: {errors} problem(s) found");
    }
    if !json {
        println!("{} {} is valid", style("✓").green().bold(), input);
    }
    Ok(())
}
