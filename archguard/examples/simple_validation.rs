//! Simple validation example: check a diagram and print the results.

use archguard::prelude::*;
use std::path::Path;

fn main() -> Result<(), ArchGuardError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/valid_soc.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_validation [path/to/arch_diagram.json]");
        std::process::exit(1);
    }

    let diagram = ArchGuardCore::load_diagram(path)?;
    let report = ArchGuardCore::validate_diagram(&diagram);

    println!("Structural check for: {}", path.display());
    for issue in &report.issues {
        println!("  [{:?}] {}", issue.severity, issue.description);
    }

    let diagram = if report.is_valid {
        diagram
    } else {
        println!("Applying auto-fixes...");
        ArchGuardCore::apply_auto_fixes(&diagram, &report)
    };

    let result = ArchGuardCore::run_check(&diagram, &DrcOptions::default())?;
    println!();
    println!("Checks run: {}", result.total_checks);
    println!(
        "Critical: {}  Warning: {}  Info: {}",
        result.summary.critical, result.summary.warning, result.summary.info
    );

    for violation in result.at_least(Severity::Critical) {
        println!("  - [{}] {}", violation.rule_id(), violation.description);
        println!("    Suggestion: {}", violation.suggestion);
    }

    if !result.passed {
        println!("\nDesign rule check failed (critical violations).");
        std::process::exit(1);
    }

    println!("\nDesign rule check passed.");
    Ok(())
}
