//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - variational quantum circuit classifier",
        style("qcc").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qcc-sim   Statevector engine");
    println!("  qcc-ml    Classifier circuit, optimizer and evaluator");
    println!("  qcc-cli   Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
