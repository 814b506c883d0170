//! End-to-end tests for the qbridge binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const BELL: &str = "namespace Demo;

@entry
operation Bell {
    h 0;
    cx 0, 1;
    measure 0;
    measure 1;
}

operation Flip {
    x 0;
    measure 0;
}
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn qbridge(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_qbridge"));
        for (key, _) in std::env::vars() {
            if key.starts_with("QBRIDGE_") {
                cmd.env_remove(key);
            }
        }
        cmd.env("HOME", self.dir.path())
            .current_dir(self.dir.path())
            .args(args)
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json_lines(output: &Output) -> Vec<Value> {
    stdout(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn bucket_total(message: &Value) -> u64 {
    message["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bucket| bucket[1].as_u64().unwrap())
        .sum()
}

#[test]
fn test_version() {
    let ws = Workspace::new();
    let output = ws.qbridge(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_check_lists_lenses() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&["check", path_arg(&bell), "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let report: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(report["diagnostics"].as_array().unwrap().is_empty());
    assert_eq!(report["operations"].as_array().unwrap().len(), 2);
    let lenses: Vec<&str> = report["lenses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l.as_str().unwrap())
        .collect();
    assert!(lenses.contains(&"Demo.Bell [Histogram]"));
    assert!(lenses.contains(&"Demo.Flip [Circuit]"));
}

#[test]
fn test_check_reports_problems() {
    let ws = Workspace::new();
    let bad = ws.file("bad.qb", "@entry operation A {\n    hh 0;\n}\n");

    let output = ws.qbridge(&["check", path_arg(&bad)]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Unknown gate 'hh'"));
    assert!(stderr(&output).contains("problem(s) found"));
}

#[test]
fn test_histogram_json_local() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&[
        "histogram",
        path_arg(&bell),
        "--shots",
        "200",
        "--json",
        "--seed",
        "7",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let messages = json_lines(&output);
    let last = messages.last().unwrap();
    assert_eq!(last["command"], "update");
    assert_eq!(bucket_total(last), 200);
    for bucket in last["buckets"].as_array().unwrap() {
        let label = bucket[0].as_str().unwrap();
        assert!(label == "00" || label == "11", "unexpected {label}");
    }
}

#[test]
fn test_histogram_selected_entry() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&[
        "histogram",
        path_arg(&bell),
        "--entry",
        "Demo.Flip",
        "--shots",
        "10",
        "--json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let messages = json_lines(&output);
    let last = messages.last().unwrap();
    assert_eq!(last["buckets"], serde_json::json!([["1", 10]]));
}

#[test]
fn test_histogram_process_mode() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&[
        "--mode",
        "process",
        "histogram",
        path_arg(&bell),
        "--shots",
        "50",
        "--json",
        "--seed",
        "3",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let messages = json_lines(&output);
    assert_eq!(bucket_total(messages.last().unwrap()), 50);
}

#[test]
fn test_histogram_terminal_output() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&["histogram", path_arg(&bell), "--shots", "20"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Running"));
    assert!(stdout(&output).contains('█'));
}

#[test]
fn test_histogram_compile_error() {
    let ws = Workspace::new();
    let bad = ws.file("bad.qb", "@entry operation A {\n    hh 0;\n}\n");

    let output = ws.qbridge(&["histogram", path_arg(&bad), "--json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error:"));

    let messages = json_lines(&output);
    assert_eq!(messages.last().unwrap()["command"], "error");
}

#[test]
fn test_histogram_step_limit_in_worker_process() {
    let ws = Workspace::new();
    let config = ws.file("qbridge.yaml", "worker:\n  max_steps: 3\n");
    let program = ws.file(
        "wide.qb",
        "@entry operation A {\n    h 0;\n    h 0;\n    h 0;\n    measure 0;\n}\n",
    );

    let output = ws.qbridge(&[
        "--config",
        path_arg(&config),
        "--mode",
        "process",
        "histogram",
        path_arg(&program),
        "--json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Compilation failed"));
    assert!(stderr(&output).contains("expands to 4 steps"));

    let messages = json_lines(&output);
    assert_eq!(messages.last().unwrap()["command"], "error");
}

#[test]
fn test_circuit_json() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&["circuit", path_arg(&bell), "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let messages = json_lines(&output);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["command"], "circuit");
    assert!(messages[0]["circuit"].is_object());
}

#[test]
fn test_circuit_terminal_output() {
    let ws = Workspace::new();
    let bell = ws.file("bell.qb", BELL);

    let output = ws.qbridge(&["circuit", path_arg(&bell), "--operation", "Flip"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Measure"));
}

#[test]
fn test_missing_file() {
    let ws = Workspace::new();
    let output = ws.qbridge(&["histogram", "nope.qb"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("File not found: nope.qb"));
}

#[test]
fn test_config_file_and_flags() {
    let ws = Workspace::new();
    let config = ws.file(
        "qbridge.yaml",
        "default_shots: 33\nprofile: unrestricted\nworker:\n  max_workers: 4\n",
    );

    let output = ws.qbridge(&["--config", path_arg(&config), "--timeout-ms", "1500", "config"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let yaml = stdout(&output);
    assert!(yaml.contains("default_shots: 33"));
    assert!(yaml.contains("max_workers: 4"));
    assert!(yaml.contains("timeout_ms: 1500"));
}

#[test]
fn test_invalid_timeout_rejected() {
    let ws = Workspace::new();
    let output = ws.qbridge(&["--timeout-ms", "0", "config"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("timeout_ms must be greater than 0"));
}
