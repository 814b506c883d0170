//! Bridge configuration.
//!
//! Sources, lowest to highest precedence:
//! 1. Default values
//! 2. The YAML file (`--config`, else `~/.qbridge/config.yaml` if present)
//! 3. `QBRIDGE_*` environment variables
//! 4. Command-line flags (applied by the caller)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use qbridge_dispatch::{DispatchConfig, RefreshPolicy};
use qbridge_proto::TargetProfile;
use qbridge_worker::DEFAULT_TIMEOUT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {name}: {message}")]
    Env { name: String, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Where workers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// Engine on a blocking thread inside this process.
    #[default]
    Local,
    /// A `qbridge worker` child process per handle.
    Process,
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMode::Local => f.write_str("local"),
            WorkerMode::Process => f.write_str("process"),
        }
    }
}

impl FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(WorkerMode::Local),
            "process" => Ok(WorkerMode::Process),
            other => Err(format!(
                "Unknown worker mode: '{other}'. Available: local, process"
            )),
        }
    }
}

/// Worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub mode: WorkerMode,

    /// Worker executable for process mode; defaults to this binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,

    /// Deadline for one request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Workers that may be checked out at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Run-event channel capacity
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Simulator qubit limit
    #[serde(default = "default_max_qubits")]
    pub max_qubits: usize,

    /// Simulator cap on an operation's inlined size
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

/// Display refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Refresh after this many new events
    #[serde(default = "default_refresh_every")]
    pub refresh_every: u32,

    /// ...or after this much time, in milliseconds
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    /// Shots when a command does not say
    #[serde(default = "default_shots")]
    pub default_shots: u32,

    #[serde(default)]
    pub profile: TargetProfile,
}

// Default value functions
fn default_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(300_000)
}

fn default_max_workers() -> usize {
    2
}

fn default_event_buffer() -> usize {
    256
}

fn default_max_qubits() -> usize {
    qbridge_adapter_sim::DEFAULT_MAX_QUBITS
}

fn default_max_steps() -> usize {
    qbridge_adapter_sim::DEFAULT_MAX_STEPS
}

fn default_refresh_every() -> u32 {
    100
}

fn default_refresh_interval_ms() -> u64 {
    250
}

fn default_shots() -> u32 {
    100
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: WorkerMode::default(),
            program: None,
            timeout_ms: default_timeout_ms(),
            max_workers: default_max_workers(),
            event_buffer: default_event_buffer(),
            max_qubits: default_max_qubits(),
            max_steps: default_max_steps(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_every: default_refresh_every(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            display: DisplayConfig::default(),
            default_shots: default_shots(),
            profile: TargetProfile::default(),
        }
    }
}

impl BridgeConfig {
    /// `~/.qbridge/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".qbridge").join("config.yaml"))
    }

    /// Load a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<yaml>".to_string(),
            message: e.to_string(),
        })
    }

    /// File (explicit or default), then environment, then validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    debug!("Loading configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        let config = config.merge_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QBRIDGE_*` overrides read through `lookup`.
    ///
    /// Only variables that are set override; malformed values are errors.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
        where
            T::Err: fmt::Display,
        {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
                name: name.to_string(),
                message: e.to_string(),
            })
        }

        // Worker
        if let Some(v) = lookup("QBRIDGE_WORKER_MODE") {
            self.worker.mode = parse("QBRIDGE_WORKER_MODE", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_WORKER_PROGRAM") {
            self.worker.program = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("QBRIDGE_TIMEOUT_MS") {
            self.worker.timeout_ms = parse("QBRIDGE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_MAX_WORKERS") {
            self.worker.max_workers = parse("QBRIDGE_MAX_WORKERS", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_EVENT_BUFFER") {
            self.worker.event_buffer = parse("QBRIDGE_EVENT_BUFFER", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_MAX_QUBITS") {
            self.worker.max_qubits = parse("QBRIDGE_MAX_QUBITS", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_MAX_STEPS") {
            self.worker.max_steps = parse("QBRIDGE_MAX_STEPS", &v)?;
        }

        // Display
        if let Some(v) = lookup("QBRIDGE_REFRESH_EVERY") {
            self.display.refresh_every = parse("QBRIDGE_REFRESH_EVERY", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_REFRESH_INTERVAL_MS") {
            self.display.refresh_interval_ms = parse("QBRIDGE_REFRESH_INTERVAL_MS", &v)?;
        }

        if let Some(v) = lookup("QBRIDGE_SHOTS") {
            self.default_shots = parse("QBRIDGE_SHOTS", &v)?;
        }
        if let Some(v) = lookup("QBRIDGE_PROFILE") {
            self.profile = parse("QBRIDGE_PROFILE", &v)?;
        }

        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.worker.max_workers == 0 {
            return Err(ConfigError::Validation(
                "max_workers must be greater than 0".to_string(),
            ));
        }
        if self.worker.event_buffer == 0 {
            return Err(ConfigError::Validation(
                "event_buffer must be greater than 0".to_string(),
            ));
        }
        if self.worker.max_qubits == 0 {
            return Err(ConfigError::Validation(
                "max_qubits must be greater than 0".to_string(),
            ));
        }
        if self.worker.max_steps == 0 {
            return Err(ConfigError::Validation(
                "max_steps must be greater than 0".to_string(),
            ));
        }
        if self
            .worker
            .program
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation(
                "worker program must not be empty; omit it to use this binary".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.worker.timeout_ms)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            refresh: RefreshPolicy {
                every_events: self.display.refresh_every,
                min_interval: Duration::from_millis(self.display.refresh_interval_ms),
            },
            event_buffer: self.worker.event_buffer,
            profile: self.profile,
        }
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(|e| ConfigError::Validation(e.to_string()))
    }
}
