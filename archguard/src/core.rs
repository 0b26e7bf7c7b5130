//! Core validation API shared by the CLI and embedding applications.
//! Everything here is synchronous and free of global state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::diagram::Diagram;
use crate::drc::{aggregate, DrcResult, RuleId, RulesEngine};
use crate::structural::{self, ValidationReport};

/// File name the project scan looks for.
pub const DIAGRAM_FILE: &str = "arch_diagram.json";
/// File name DRC results are written to next to a diagram.
pub const RESULTS_FILE: &str = "drc_results.json";

pub const DEFAULT_NAMING_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_\- ]*$";

#[derive(Debug, thiserror::Error)]
pub enum ArchGuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Diagram is structurally invalid ({count} error(s)); first: {first}")]
    StructurallyInvalid { count: usize, first: String },
}

/// Options for a DRC run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DrcOptions {
    /// Also report unconnected interfaces marked optional
    pub check_optional_ports: bool,
    /// Regex display names must match
    pub naming_pattern: String,
    /// Rule ids to run; empty runs the whole catalog
    pub rules: Vec<String>,
}

impl Default for DrcOptions {
    fn default() -> Self {
        Self {
            check_optional_ports: false,
            naming_pattern: DEFAULT_NAMING_PATTERN.to_string(),
            rules: vec![],
        }
    }
}

impl DrcOptions {
    /// Load options from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ArchGuardError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ArchGuardError> {
        let options: DrcOptions = serde_json::from_str(content)?;
        options.enabled_rules()?;
        Ok(options)
    }

    /// The rule filter as ids, or `None` when every rule runs.
    pub fn enabled_rules(&self) -> Result<Option<HashSet<RuleId>>, ArchGuardError> {
        if self.rules.is_empty() {
            return Ok(None);
        }
        self.rules
            .iter()
            .map(|r| r.parse::<RuleId>().map_err(ArchGuardError::Config))
            .collect::<Result<HashSet<_>, _>>()
            .map(Some)
    }
}

/// Diagram, structural report and DRC result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The diagram the DRC ran on (reconciled when auto-fix was requested)
    pub diagram: Diagram,
    /// Issues found before any fix was applied
    pub initial: ValidationReport,
    /// Issues remaining on `diagram`
    pub report: ValidationReport,
    /// Whether auto-fix rewrote the diagram
    pub fixed: bool,
    /// `None` when structural errors remain
    pub result: Option<DrcResult>,
}

/// Per-file outcome of a project scan.
#[derive(Debug, Clone)]
pub struct ProjectResult {
    pub file: PathBuf,
    pub outcome: PipelineOutcome,
}

impl ProjectResult {
    pub fn passed(&self) -> bool {
        self.outcome.result.as_ref().map(|r| r.passed).unwrap_or(false)
    }
}

/// Recursively discover `arch_diagram.json` files in a directory.
pub fn discover_diagrams(dir: &Path) -> Result<Vec<PathBuf>, ArchGuardError> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort();
    Ok(files)
}

const SKIPPED_DIRS: [&str; 3] = ["node_modules", "target", "build"];

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> Result<(), ArchGuardError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name) {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() && path.file_name().and_then(|n| n.to_str()) == Some(DIAGRAM_FILE)
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Core validation API used by the CLI.
pub struct ArchGuardCore;

impl ArchGuardCore {
    /// Structural pass. Never fails; problems come back as issues.
    pub fn validate_diagram(diagram: &Diagram) -> ValidationReport {
        structural::validate_diagram(diagram)
    }

    /// Reconcile `diagram` against the issues of a structural pass.
    pub fn apply_auto_fixes(diagram: &Diagram, report: &ValidationReport) -> Diagram {
        structural::apply_auto_fixes(diagram, &report.issues)
    }

    /// Run the rule catalog on a structurally valid diagram.
    pub fn run_check(diagram: &Diagram, options: &DrcOptions) -> Result<DrcResult, ArchGuardError> {
        let report = structural::validate_diagram(diagram);
        let mut errors = report.errors();
        if let Some(first) = errors.next() {
            return Err(ArchGuardError::StructurallyInvalid {
                count: errors.count() + 1,
                first: first.description.clone(),
            });
        }

        let run = RulesEngine::with_default_rules().analyze(diagram, options)?;
        let result = aggregate(run.violations, run.total_checks);
        tracing::info!(
            checks = result.total_checks,
            critical = result.summary.critical,
            warning = result.summary.warning,
            info = result.summary.info,
            passed = result.passed,
            "design rule check complete"
        );
        Ok(result)
    }

    /// Validate, optionally reconcile, then check.
    ///
    /// Unlike [`ArchGuardCore::run_check`] a diagram that stays structurally
    /// invalid is not an error: the outcome simply carries no DRC result.
    pub fn run_pipeline(
        diagram: &Diagram,
        options: &DrcOptions,
        auto_fix: bool,
    ) -> Result<PipelineOutcome, ArchGuardError> {
        let initial = structural::validate_diagram(diagram);
        let fixed = auto_fix && !initial.issues.is_empty();
        let (diagram, report) = if fixed {
            let reconciled = structural::apply_auto_fixes(diagram, &initial.issues);
            let report = structural::validate_diagram(&reconciled);
            tracing::info!(
                before = initial.issues.len(),
                after = report.issues.len(),
                "auto-fix applied"
            );
            (reconciled, report)
        } else {
            (diagram.clone(), initial.clone())
        };

        let result = if report.is_valid {
            Some(Self::run_check(&diagram, options)?)
        } else {
            None
        };

        Ok(PipelineOutcome {
            diagram,
            initial,
            report,
            fixed,
            result,
        })
    }

    pub fn load_diagram(path: &Path) -> Result<Diagram, ArchGuardError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_diagram(path: &Path, diagram: &Diagram) -> Result<(), ArchGuardError> {
        let json = serde_json::to_string_pretty(diagram)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_result(path: &Path) -> Result<DrcResult, ArchGuardError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write a DRC result, replacing any previous one.
    pub fn save_result(path: &Path, result: &DrcResult) -> Result<(), ArchGuardError> {
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `drc_results.json` next to a diagram file.
    pub fn result_path_for(diagram_path: &Path) -> PathBuf {
        diagram_path
            .parent()
            .map(|p| p.join(RESULTS_FILE))
            .unwrap_or_else(|| PathBuf::from(RESULTS_FILE))
    }

    /// Run the pipeline on every diagram under `dir`. Files that cannot be
    /// read or parsed are skipped with a warning.
    pub fn validate_project(
        dir: &Path,
        options: &DrcOptions,
        auto_fix: bool,
    ) -> Result<Vec<ProjectResult>, ArchGuardError> {
        options.enabled_rules()?;
        let files = discover_diagrams(dir)?;
        tracing::info!(count = files.len(), dir = %dir.display(), "discovered diagrams");

        let mut results = Vec::new();
        for file in files {
            let diagram = match Self::load_diagram(&file) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        file = %file.display(),
                        error = %e,
                        "skipping unreadable diagram"
                    );
                    continue;
                }
            };
            let outcome = Self::run_pipeline(&diagram, options, auto_fix)?;
            results.push(ProjectResult { file, outcome });
        }
        Ok(results)
    }
}
