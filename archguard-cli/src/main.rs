//! ArchGuard CLI - SoC architecture diagram validation from the command line.

use anyhow::{Context, Result};
use archguard::drc::Rule;
use archguard::{
    ArchGuardCore, AutoFix, DrcOptions, DrcResult, DrcViolation, IssueSeverity, RulesEngine,
    Severity, ValidationIssue, ValidationReport,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "archguard")]
#[command(
    about = "SoC architecture diagram validation and design rule checking",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Verbose logging; with `rules`, show rule details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a diagram for structural problems
    Validate {
        /// Path to arch_diagram.json
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Apply the structural auto-fixes to a diagram
    Fix {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write the fixed diagram here instead of in place
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Run the design rule checks on a diagram
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Reconcile structural issues in memory before checking
        #[arg(long)]
        auto_fix: bool,

        /// Also report unconnected optional interfaces
        #[arg(long)]
        check_optional_ports: bool,

        /// JSON file with DRC options
        #[arg(short, long, value_name = "CFG")]
        config: Option<PathBuf>,

        /// Write the DRC result to this file
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if violations found at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,
    },

    /// Check every arch_diagram.json under a directory
    Project {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        #[arg(long)]
        auto_fix: bool,

        #[arg(long)]
        check_optional_ports: bool,

        #[arg(short, long, value_name = "CFG")]
        config: Option<PathBuf>,

        /// Do not write drc_results.json next to each diagram
        #[arg(long)]
        no_save: bool,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,
    },

    /// List the design rule catalog
    Rules,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
    /// GitLab code quality format
    Gitlab,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailOnSeverity {
    Critical,
    Warning,
    Info,
}

impl From<FailOnSeverity> for Severity {
    fn from(value: FailOnSeverity) -> Self {
        match value {
            FailOnSeverity::Critical => Severity::Critical,
            FailOnSeverity::Warning => Severity::Warning,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

/// What one file contributed to the output
struct FileReport<'a> {
    file: &'a Path,
    report: &'a ValidationReport,
    result: Option<&'a DrcResult>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,archguard=debug,archguard_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Validate { file, format } => handle_validate(&file, format),
        Commands::Fix {
            file,
            output,
            dry_run,
            format,
        } => handle_fix(&file, output.as_deref(), dry_run, format),
        Commands::Check {
            file,
            auto_fix,
            check_optional_ports,
            config,
            save,
            format,
            fail_on,
        } => {
            let options = load_options(config.as_deref(), check_optional_ports)?;
            handle_check(&file, &options, auto_fix, save.as_deref(), format, fail_on)
        }
        Commands::Project {
            dir,
            auto_fix,
            check_optional_ports,
            config,
            no_save,
            format,
            fail_on,
        } => {
            let options = load_options(config.as_deref(), check_optional_ports)?;
            handle_project(&dir, &options, auto_fix, !no_save, format, fail_on)
        }
        Commands::Rules => {
            handle_rules(cli.verbose);
            Ok(0)
        }
    }
}

fn load_options(config: Option<&Path>, check_optional_ports: bool) -> Result<DrcOptions> {
    let mut options = match config {
        Some(path) => DrcOptions::from_file(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => DrcOptions::default(),
    };
    if check_optional_ports {
        options.check_optional_ports = true;
    }
    tracing::debug!(
        check_optional_ports = options.check_optional_ports,
        naming_pattern = %options.naming_pattern,
        rules = ?options.rules,
        "loaded DRC options"
    );
    Ok(options)
}

fn load_diagram(file: &Path) -> Result<archguard::Diagram> {
    tracing::debug!(file = %file.display(), "loading diagram");
    ArchGuardCore::load_diagram(file)
        .with_context(|| format!("failed to load diagram {}", file.display()))
}

fn handle_validate(file: &Path, format: OutputFormat) -> Result<i32> {
    let diagram = load_diagram(file)?;
    let report = ArchGuardCore::validate_diagram(&diagram);

    output_results(
        &[FileReport {
            file,
            report: &report,
            result: None,
        }],
        format,
    )?;
    Ok(if report.is_valid { 0 } else { 1 })
}

fn handle_fix(
    file: &Path,
    output: Option<&Path>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<i32> {
    let diagram = load_diagram(file)?;
    let before = ArchGuardCore::validate_diagram(&diagram);
    let fixed = ArchGuardCore::apply_auto_fixes(&diagram, &before);
    let after = ArchGuardCore::validate_diagram(&fixed);

    let target = output.unwrap_or(file);
    if dry_run {
        eprintln!(
            "Dry run: {} issue(s) would be fixed, {} would remain",
            before.issues.len().saturating_sub(after.issues.len()),
            after.issues.len()
        );
    } else if fixed != diagram || output.is_some() {
        ArchGuardCore::save_diagram(target, &fixed)
            .with_context(|| format!("failed to write {}", target.display()))?;
        eprintln!(
            "Fixed {} issue(s); wrote {}",
            before.issues.len().saturating_sub(after.issues.len()),
            target.display()
        );
    } else {
        eprintln!("Nothing to fix");
    }

    output_results(
        &[FileReport {
            file: target,
            report: &after,
            result: None,
        }],
        format,
    )?;
    Ok(if after.is_valid { 0 } else { 1 })
}

fn handle_check(
    file: &Path,
    options: &DrcOptions,
    auto_fix: bool,
    save: Option<&Path>,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
) -> Result<i32> {
    let mut diagram = load_diagram(file)?;
    if auto_fix {
        let report = ArchGuardCore::validate_diagram(&diagram);
        diagram = ArchGuardCore::apply_auto_fixes(&diagram, &report);
    }
    let report = ArchGuardCore::validate_diagram(&diagram);
    let result = ArchGuardCore::run_check(&diagram, options)
        .with_context(|| format!("cannot check {}", file.display()))?;

    if let Some(path) = save {
        ArchGuardCore::save_result(path, &result)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    output_results(
        &[FileReport {
            file,
            report: &report,
            result: Some(&result),
        }],
        format,
    )?;
    Ok(if should_fail(&result, fail_on) { 1 } else { 0 })
}

fn handle_project(
    dir: &Path,
    options: &DrcOptions,
    auto_fix: bool,
    save: bool,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
) -> Result<i32> {
    let results = ArchGuardCore::validate_project(dir, options, auto_fix)
        .with_context(|| format!("failed to scan {}", dir.display()))?;

    if save {
        for project in &results {
            if let Some(ref result) = project.outcome.result {
                let path = ArchGuardCore::result_path_for(&project.file);
                ArchGuardCore::save_result(&path, result)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
        }
    }

    let reports: Vec<FileReport<'_>> = results
        .iter()
        .map(|p| FileReport {
            file: &p.file,
            report: &p.outcome.report,
            result: p.outcome.result.as_ref(),
        })
        .collect();
    output_results(&reports, format)?;

    let failed = results.iter().any(|p| match p.outcome.result {
        Some(ref result) => should_fail(result, fail_on),
        None => true,
    });
    Ok(if failed { 1 } else { 0 })
}

/// Without `--fail-on` a run fails exactly when it did not pass.
fn should_fail(result: &DrcResult, fail_on: Option<FailOnSeverity>) -> bool {
    match fail_on {
        Some(threshold) => result.at_least(threshold.into()).next().is_some(),
        None => !result.passed,
    }
}

fn output_results(results: &[FileReport<'_>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => {
            output_human(results);
            Ok(())
        }
        OutputFormat::Json => output_json(results),
        OutputFormat::Github => {
            output_github(results);
            Ok(())
        }
        OutputFormat::Gitlab => output_gitlab(results),
    }
}

fn auto_fix_label(fix: AutoFix) -> &'static str {
    match fix {
        AutoFix::Remove => "remove",
        AutoFix::RemoveDuplicate => "remove duplicate",
        AutoFix::Reverse => "reverse",
        AutoFix::Rename => "rename",
        AutoFix::OffsetPosition => "rename and offset",
    }
}

fn print_issue(issue: &ValidationIssue) {
    match issue.auto_fix {
        Some(fix) => println!("    - {} (auto-fix: {})", issue.description, auto_fix_label(fix)),
        None => println!("    - {}", issue.description),
    }
}

fn print_violations(title: &str, violations: &[&DrcViolation]) {
    if violations.is_empty() {
        return;
    }
    println!("\n  {}:", title);
    for v in violations {
        println!("    - [{}] {}", v.rule_id(), v.description);
        println!("      Location:   {}", v.location);
        println!("      Suggestion: {}", v.suggestion);
    }
}

fn output_human(results: &[FileReport<'_>]) {
    if results.is_empty() {
        println!("No diagrams found");
    }
    for entry in results {
        println!("\nFile: {}", entry.file.display());
        println!("{}", "─".repeat(60));

        let errors: Vec<_> = entry.report.errors().collect();
        let warnings: Vec<_> = entry.report.warnings().collect();
        if entry.report.issues.is_empty() {
            println!("  Structure: OK");
        } else {
            println!(
                "  Structure: {} error(s), {} warning(s)",
                errors.len(),
                warnings.len()
            );
            errors.into_iter().for_each(print_issue);
            warnings.into_iter().for_each(print_issue);
        }

        let Some(result) = entry.result else {
            continue;
        };
        let by = |s: Severity| -> Vec<&DrcViolation> {
            result.violations.iter().filter(|v| v.severity == s).collect()
        };
        print_violations("CRITICAL", &by(Severity::Critical));
        print_violations("WARNING", &by(Severity::Warning));
        print_violations("INFO", &by(Severity::Info));

        println!("\n  Summary:");
        println!("    Checks:   {}", result.total_checks);
        for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
            println!(
                "    {:<10}{}",
                format!("{}:", severity_label(severity)),
                result.summary.count(severity)
            );
        }
        println!("    Result:   {}", if result.passed { "PASSED" } else { "FAILED" });
    }
}

fn output_json(results: &[FileReport<'_>]) -> Result<()> {
    let checked = || results.iter().filter_map(|r| r.result);
    let output = serde_json::json!({
        "results": results.iter().map(|r| {
            serde_json::json!({
                "file": r.file.display().to_string(),
                "structural": r.report,
                "drc": r.result,
            })
        }).collect::<Vec<_>>(),
        "summary": {
            "total_files": results.len(),
            "structural_errors": results.iter().map(|r| r.report.errors().count()).sum::<usize>(),
            "total_violations": checked().map(|r| r.violations.len()).sum::<usize>(),
            "critical": checked().map(|r| r.summary.critical).sum::<usize>(),
            "passed": results
                .iter()
                .all(|r| r.result.map(|d| d.passed).unwrap_or(r.report.is_valid)),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn issue_to_github(issue: &ValidationIssue) -> &'static str {
    match issue.severity {
        IssueSeverity::Error => "error",
        IssueSeverity::Warning => "warning",
    }
}

fn severity_to_github(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "error",
        Severity::Warning => "warning",
        Severity::Info => "notice",
    }
}

fn output_github(results: &[FileReport<'_>]) {
    for entry in results {
        for issue in &entry.report.issues {
            println!(
                "::{} file={}::{}",
                issue_to_github(issue),
                entry.file.display(),
                issue.description.replace('\n', " ")
            );
        }
        for v in entry.result.iter().flat_map(|r| &r.violations) {
            println!(
                "::{} file={},title={}::{}",
                severity_to_github(v.severity),
                entry.file.display(),
                v.rule_id(),
                v.description.replace('\n', " ")
            );
        }
    }
}

fn severity_to_gitlab(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "blocker",
        Severity::Warning => "major",
        Severity::Info => "info",
    }
}

fn output_gitlab(results: &[FileReport<'_>]) -> Result<()> {
    let mut reports = Vec::new();
    for entry in results {
        let path = entry.file.display().to_string();
        for issue in &entry.report.issues {
            reports.push(serde_json::json!({
                "description": issue.description,
                "check_name": "structure",
                "severity": match issue.severity {
                    IssueSeverity::Error => "blocker",
                    IssueSeverity::Warning => "major",
                },
                "location": { "path": path, "lines": { "begin": 1 } },
            }));
        }
        for v in entry.result.iter().flat_map(|r| &r.violations) {
            reports.push(serde_json::json!({
                "description": v.description,
                "check_name": v.rule_id().as_str(),
                "fingerprint": v.id,
                "severity": severity_to_gitlab(v.severity),
                "location": { "path": path, "lines": { "begin": 1 } },
            }));
        }
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn handle_rules(verbose: bool) {
    println!("Available design rules:\n");

    for rule in RulesEngine::with_default_rules().rules() {
        let id = rule.id();
        println!("  {}  {}", id, rule.name());
        println!("    {} / {}", id.category(), rule.severity());
        if verbose {
            println!("    {}", id.summary());
        }
        println!();
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::Warning => "Warning",
        Severity::Info => "Info",
    }
}
