//! Config command: print the effective configuration.

use anyhow::Result;
use console::style;

use crate::config::BridgeConfig;

/// Execute the config command.
pub fn execute(config: &BridgeConfig) -> Result<()> {
    match BridgeConfig::default_path() {
        Some(path) if path.exists() => {
            eprintln!("{} {}", style("Config file:").dim(), path.display());
        }
        Some(path) => {
            eprintln!("{} {} (not present)", style("Config file:").dim(), path.display());
        }
        None => eprintln!("{}", style("No home directory; using defaults").dim()),
    }
    print!("{}", config.to_yaml()?);
    Ok(())
}
