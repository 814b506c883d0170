//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - bridge between editor commands and quantum compute workers",
        style("qbridge").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qbridge-proto        Worker request/response and wire frames");
    println!("  qbridge-worker       Worker handles, pool and transports");
    println!("  qbridge-dispatch     Commands, aggregation and display panels");
    println!("  qbridge-adapter-sim  Statevector engine");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
