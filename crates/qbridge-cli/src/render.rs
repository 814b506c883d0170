//! Terminal rendering of display messages.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use qbridge_dispatch::{
    CircuitOutcome, CircuitResult, DispatchResult, DisplayMessage, DisplaySurface, Histogram,
};
use qbridge_proto::{CircuitData, CircuitOp, Register, RegisterKind};

/// Rows shown before the histogram is truncated.
const MAX_ROWS: usize = 16;

/// Spinner shown while waiting on a worker.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Histogram panel: live progress on a spinner while a run streams.
///
/// The final table is printed by the command once the run returns.
pub struct ProgressSurface {
    spinner: ProgressBar,
    shots: u32,
}

impl ProgressSurface {
    pub fn new(spinner: ProgressBar, shots: u32) -> Self {
        Self { spinner, shots }
    }
}

impl DisplaySurface for ProgressSurface {
    fn post(&mut self, message: &DisplayMessage) -> DispatchResult<()> {
        match message {
            DisplayMessage::Update { buckets } => {
                let total: u64 = buckets.iter().map(|(_, c)| c).sum();
                self.spinner.set_message(format!(
                    "{total}/{} shots, {} outcomes",
                    self.shots,
                    buckets.len()
                ));
            }
            DisplayMessage::Error { title, .. } => {
                self.spinner.set_message(format!("{title} failed"));
            }
            DisplayMessage::Circuit(_) => {}
        }
        Ok(())
    }

    fn close(&mut self) {
        self.spinner.finish_and_clear();
    }
}

/// Circuit panel: prints each circuit result as a text diagram.
pub struct CircuitSurface {
    spinner: ProgressBar,
}

impl CircuitSurface {
    pub fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

impl DisplaySurface for CircuitSurface {
    fn post(&mut self, message: &DisplayMessage) -> DispatchResult<()> {
        self.spinner.finish_and_clear();
        match message {
            DisplayMessage::Circuit(result) => print_circuit_result(result),
            DisplayMessage::Error { title, message } => {
                println!("{} {}: {}", style("✗").red().bold(), title, message);
            }
            DisplayMessage::Update { .. } => {}
        }
        Ok(())
    }

    fn close(&mut self) {
        self.spinner.finish_and_clear();
    }
}

/// Print a histogram with percentage bars.
pub fn print_histogram(histogram: &Histogram, shots: u32) {
    println!(
        "\n{} Results ({} shots):",
        style("✓").green().bold(),
        shots
    );

    let mut rows: Vec<(&str, u64)> = histogram.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let total = histogram.total().max(1) as f64;

    for (label, count) in rows.iter().take(MAX_ROWS) {
        let prob = *count as f64 / total * 100.0;
        let bar = "█".repeat((prob / 2.0).round() as usize);
        println!(
            "  {}: {:>6} ({:>5.2}%) {}",
            style(label).cyan(),
            count,
            prob,
            style(bar).green()
        );
    }

    if rows.len() > MAX_ROWS {
        println!("  ... and {} more outcomes", rows.len() - MAX_ROWS);
    }
}

fn print_circuit_result(result: &CircuitResult) {
    println!("{}", style(&result.title).cyan().bold());
    println!("{}", style(&result.subtitle).dim());
    match &result.outcome {
        CircuitOutcome::Circuit(data) => {
            for line in circuit_lines(data) {
                println!("{line}");
            }
        }
        CircuitOutcome::Error(message) => {
            println!("{} {}", style("✗").red().bold(), message);
        }
    }
}

/// Text rendering of circuit data, one operation per line.
pub fn circuit_lines(data: &CircuitData) -> Vec<String> {
    let results: Vec<String> = data
        .qubits
        .iter()
        .map(|w| format!("q{}={}", w.id, w.num_results))
        .collect();
    let mut lines = vec![format!(
        "{} qubits (results: {})",
        data.qubits.len(),
        if results.is_empty() {
            "none".to_string()
        } else {
            results.join(", ")
        }
    )];
    for op in &data.operations {
        push_op(op, 1, &mut lines);
    }
    lines
}

fn push_op(op: &CircuitOp, depth: usize, lines: &mut Vec<String>) {
    let name = match &op.display_args {
        Some(args) => format!("{}({args})", op.gate),
        None => op.gate.clone(),
    };
    let mut line = format!("{}{:<12} {}", "  ".repeat(depth), name, registers(&op.targets));
    if !op.controls.is_empty() {
        let word = if op.is_measurement { "from" } else { "ctrl" };
        line.push_str(&format!(" {word} {}", registers(&op.controls)));
    }
    lines.push(line.trim_end().to_string());
    for child in &op.children {
        push_op(child, depth + 1, lines);
    }
}

fn registers(regs: &[Register]) -> String {
    regs.iter()
        .map(|r| match r.kind {
            RegisterKind::Qubit => format!("q{}", r.q_id),
            RegisterKind::Classical => format!("c{}[{}]", r.q_id, r.c_id.unwrap_or(0)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbridge_proto::QubitWire;

    #[test]
    fn test_circuit_lines() {
        let mut group = CircuitOp::gate("Bell", vec![Register::qubit(0), Register::qubit(1)]);
        let mut cx = CircuitOp::gate("X", vec![Register::qubit(1)]);
        cx.is_controlled = true;
        cx.controls = vec![Register::qubit(0)];
        group.children = vec![CircuitOp::gate("H", vec![Register::qubit(0)]), cx];

        let mut measure = CircuitOp::gate("Measure", vec![Register::classical(0, 0)]);
        measure.is_measurement = true;
        measure.controls = vec![Register::qubit(0)];

        let mut ry = CircuitOp::gate("Ry", vec![Register::qubit(0)]);
        ry.display_args = Some("1.0472".into());

        let data = CircuitData {
            qubits: vec![
                QubitWire { id: 0, num_results: 1 },
                QubitWire { id: 1, num_results: 0 },
            ],
            operations: vec![ry, group, measure],
        };

        let lines = circuit_lines(&data);
        assert_eq!(lines[0], "2 qubits (results: q0=1, q1=0)");
        assert_eq!(lines[1], "  Ry(1.0472)   q0");
        assert_eq!(lines[2], "  Bell         q0, q1");
        assert_eq!(lines[3], "    H            q0");
        assert_eq!(lines[4], "    X            q1 ctrl q0");
        assert_eq!(lines[5], "  Measure      c0[0] from q0");
    }

    #[test]
    fn test_progress_surface_accepts_all_messages() {
        let mut surface = ProgressSurface::new(ProgressBar::hidden(), 10);
        surface
            .post(&DisplayMessage::Update {
                buckets: vec![("0".into(), 3)],
            })
            .unwrap();
        surface.post(&DisplayMessage::error("x", "y")).unwrap();
        surface.close();
    }
}
