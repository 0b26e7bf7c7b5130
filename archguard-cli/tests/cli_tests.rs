//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the archguard-cli binary (finds it in target/debug when run via cargo test).
fn archguard_cli() -> Command {
    cargo_bin_cmd!("archguard-cli")
}

/// Path to archguard library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("archguard")
        .join("tests")
        .join("fixtures")
}

/// Copy a fixture into a fresh temp dir as `arch_diagram.json`.
fn scratch_copy(fixture: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arch_diagram.json");
    std::fs::copy(fixtures_dir().join(fixture), &path).unwrap();
    (dir, path)
}

#[test]
fn test_cli_help() {
    let mut cmd = archguard_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SoC architecture"));
}

#[test]
fn test_cli_version() {
    let mut cmd = archguard_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_validate_valid_file() {
    let mut cmd = archguard_cli();
    cmd.arg("validate").arg(fixtures_dir().join("valid_soc.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Structure: OK"));
}

#[test]
fn test_cli_validate_broken_file_fails() {
    let mut cmd = archguard_cli();
    cmd.arg("validate").arg(fixtures_dir().join("broken_edges.json"));

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("2 error(s), 3 warning(s)"))
        .stdout(predicate::str::contains("auto-fix: remove"));
}

#[test]
fn test_cli_validate_json_output() {
    let mut cmd = archguard_cli();
    cmd.arg("validate")
        .arg(fixtures_dir().join("duplicate_nodes.json"))
        .arg("--format")
        .arg("json");

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("\"duplicate_node_id\""))
        .stdout(predicate::str::contains("\"isValid\": false"));
}

#[test]
fn test_cli_fix_in_place() {
    let (_dir, path) = scratch_copy("duplicate_nodes.json");

    let mut cmd = archguard_cli();
    cmd.arg("fix").arg(&path);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Fixed 3 issue(s)"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"cpu0-1\""));
    assert!(content.contains("\"periph0-1\""));

    let mut again = archguard_cli();
    again.arg("validate").arg(&path);
    again.assert().success();
}

#[test]
fn test_cli_fix_dry_run_leaves_file() {
    let (_dir, path) = scratch_copy("broken_edges.json");
    let before = std::fs::read_to_string(&path).unwrap();

    let mut cmd = archguard_cli();
    cmd.arg("fix").arg(&path).arg("--dry-run");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Dry run"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_cli_fix_to_output() {
    let (dir, path) = scratch_copy("broken_edges.json");
    let out = dir.path().join("fixed.json");

    let mut cmd = archguard_cli();
    cmd.arg("fix").arg(&path).arg("--output").arg(&out);
    cmd.assert().success();

    let fixed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(fixed["edges"].as_array().unwrap().len(), 1);
}

#[test]
fn test_cli_check_valid_file() {
    let mut cmd = archguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("valid_soc.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PASSED"));
}

#[test]
fn test_cli_check_critical_fails() {
    let mut cmd = archguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("width_mismatch.json"));

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("AXI-001"))
        .stdout(predicate::str::contains("Critical: 1"))
        .stdout(predicate::str::contains("FAILED"));
}

#[test]
fn test_cli_verbose_logs_to_stderr() {
    let mut cmd = archguard_cli();
    cmd.env_remove("RUST_LOG")
        .arg("--verbose")
        .arg("check")
        .arg(fixtures_dir().join("valid_soc.json"));

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("loaded DRC options"))
        .stdout(predicate::str::contains("loaded DRC options").not());
}

#[test]
fn test_cli_check_fail_on_warning() {
    let mut cmd = archguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("valid_soc.json"))
        .arg("--check-optional-ports")
        .arg("--fail-on")
        .arg("warning");

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("CONN-001"));

    let mut cmd = archguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("valid_soc.json"))
        .arg("--check-optional-ports")
        .arg("--fail-on")
        .arg("critical");
    cmd.assert().success();
}

#[test]
fn test_cli_check_structurally_invalid() {
    let mut cmd = archguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("broken_edges.json"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("structurally invalid"));
}

#[test]
fn test_cli_check_auto_fix_and_save() {
    let (dir, path) = scratch_copy("broken_edges.json");
    let save = dir.path().join("drc_results.json");

    let mut cmd = archguard_cli();
    cmd.arg("check")
        .arg(&path)
        .arg("--auto-fix")
        .arg("--save")
        .arg(&save);
    cmd.assert().success();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&save).unwrap()).unwrap();
    assert_eq!(saved["passed"], true);
    assert!(saved["timestamp"].is_string());
}

#[test]
fn test_cli_check_with_config() {
    let (dir, path) = scratch_copy("width_mismatch.json");
    let config = dir.path().join("archguard.json");
    std::fs::write(&config, r#"{"rules": ["PERF-001"]}"#).unwrap();

    let mut cmd = archguard_cli();
    cmd.arg("check")
        .arg(&path)
        .arg("--config")
        .arg(&config)
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PERF-001"))
        .stdout(predicate::str::contains("AXI-001").not());
}

#[test]
fn test_cli_check_bad_config() {
    let (dir, path) = scratch_copy("valid_soc.json");
    let config = dir.path().join("archguard.json");
    std::fs::write(&config, r#"{"rules": ["NOPE-1"]}"#).unwrap();

    let mut cmd = archguard_cli();
    cmd.arg("check").arg(&path).arg("--config").arg(&config);

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("unknown rule id"));
}

#[test]
fn test_cli_check_nonexistent_file() {
    let mut cmd = archguard_cli();

    cmd.arg("check").arg("does_not_exist.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_project_command() {
    let dir = tempfile::tempdir().unwrap();
    let soc = dir.path().join("soc");
    std::fs::create_dir_all(&soc).unwrap();
    std::fs::copy(fixtures_dir().join("valid_soc.json"), soc.join("arch_diagram.json")).unwrap();

    let mut cmd = archguard_cli();
    cmd.arg("project").arg(dir.path());
    cmd.assert().success();
    assert!(soc.join("drc_results.json").exists());
}

#[test]
fn test_cli_project_no_save() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        fixtures_dir().join("bus_cycle.json"),
        dir.path().join("arch_diagram.json"),
    )
    .unwrap();

    let mut cmd = archguard_cli();
    cmd.arg("project").arg(dir.path()).arg("--no-save");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("TOPO-002"));
    assert!(!dir.path().join("drc_results.json").exists());
}

#[test]
fn test_cli_rules_command() {
    let mut cmd = archguard_cli();

    cmd.arg("rules");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CONN-001"))
        .stdout(predicate::str::contains("Unconnected Interface"))
        .stdout(predicate::str::contains("Connectivity / warning"))
        .stdout(predicate::str::contains("NAME-002"));
}

#[test]
fn test_cli_rules_verbose() {
    let mut cmd = archguard_cli();

    cmd.arg("rules").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Memory-mapped address ranges overlap"));
}

#[test]
fn test_cli_github_format() {
    let mut cmd = archguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("width_mismatch.json"))
        .arg("--format")
        .arg("github");

    cmd.assert()
        .stdout(predicate::str::contains("::error file="))
        .stdout(predicate::str::contains("title=AXI-001"));
}

#[test]
fn test_cli_gitlab_format() {
    let mut cmd = archguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("address_map.json"))
        .arg("--format")
        .arg("gitlab");

    let output = cmd.output().unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = report.as_array().unwrap();
    assert!(entries.iter().any(|e| e["check_name"] == "ADDR-001" && e["severity"] == "blocker"));
}

#[test]
fn test_cli_output_formats_are_different() {
    let path = fixtures_dir().join("width_mismatch.json");

    let mut cmd_human = archguard_cli();
    cmd_human
        .arg("check")
        .arg(&path)
        .arg("--format")
        .arg("human");
    let human_output = cmd_human.output().unwrap();

    let mut cmd_json = archguard_cli();
    cmd_json
        .arg("check")
        .arg(&path)
        .arg("--format")
        .arg("json");
    let json_output = cmd_json.output().unwrap();

    assert_ne!(
        human_output.stdout,
        json_output.stdout,
        "Different formats should produce different output"
    );
}
