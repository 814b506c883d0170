//! qbridge command-line interface
//!
//! Runs editor-style commands against a compute worker from the terminal:
//!
//! ```text
//! qbridge histogram bell.qb --shots 1000
//! qbridge circuit bell.qb --operation Demo.Prepare
//! qbridge check bell.qb
//! qbridge worker            # serve the engine on stdin/stdout
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use qbridge_proto::TargetProfile;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{check, circuit, histogram, version, worker};
use config::{BridgeConfig, WorkerMode};

/// qbridge - run quantum programs on compute workers and show the results
#[derive(Parser)]
#[command(name = "qbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv); QBRIDGE_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ~/.qbridge/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request deadline in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Target profile (base, unrestricted)
    #[arg(long, global = true)]
    profile: Option<TargetProfile>,

    /// Where workers run (local, process)
    #[arg(long, global = true)]
    mode: Option<WorkerMode>,

    /// Fix the simulator seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program's entry point and show the outcome histogram
    Histogram {
        /// Program file
        input: String,

        /// Operation to run instead of the @entry one
        #[arg(short, long)]
        entry: Option<String>,

        /// Number of shots
        #[arg(short, long)]
        shots: Option<u32>,

        /// Additional source files compiled with the program
        #[arg(short, long = "with")]
        related: Vec<String>,

        /// Emit display messages as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the circuit of an operation
    Circuit {
        /// Program file
        input: String,

        /// Operation (Name or Namespace.Name); default is the @entry one
        #[arg(short, long)]
        operation: Option<String>,

        /// Additional source files compiled with the program
        #[arg(short, long = "with")]
        related: Vec<String>,

        /// Emit display messages as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Compile a program and list diagnostics and operations
    Check {
        /// Program file
        input: String,

        /// Additional source files compiled with the program
        #[arg(short, long = "with")]
        related: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve the simulator engine over stdin/stdout
    Worker {
        /// Simulator qubit limit
        #[arg(long, default_value_t = qbridge_adapter_sim::DEFAULT_MAX_QUBITS)]
        max_qubits: usize,

        /// Simulator cap on an operation's inlined size
        #[arg(long, default_value_t = qbridge_adapter_sim::DEFAULT_MAX_STEPS)]
        max_steps: usize,
    },

    /// Print the effective configuration
    Config,

    /// Show version information
    Version,
}

impl Cli {
    /// Configuration with flags applied last.
    fn load_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = BridgeConfig::load(self.config.as_deref())?;
        if let Some(timeout_ms) = self.timeout_ms {
            config.worker.timeout_ms = timeout_ms;
        }
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        if let Some(mode) = self.mode {
            config.worker.mode = mode;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for results and worker frames.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_env("QBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    let result = run(&cli).await;

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Histogram {
            input,
            entry,
            shots,
            related,
            json,
        } => {
            let config = cli.load_config()?;
            histogram::execute(&config, input, related, entry.clone(), *shots, *json, cli.seed)
                .await
        }

        Commands::Circuit {
            input,
            operation,
            related,
            json,
        } => {
            let config = cli.load_config()?;
            circuit::execute(&config, input, related, operation.as_deref(), *json, cli.seed).await
        }

        Commands::Check {
            input,
            related,
            json,
        } => {
            let config = cli.load_config()?;
            check::execute(&config, input, related, *json).await
        }

        Commands::Worker {
            max_qubits,
            max_steps,
        } => worker::execute(*max_qubits, *max_steps, cli.seed).await,

        Commands::Config => commands::config::execute(&cli.load_config()?),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
