//! Design rule check tests against fixture diagrams

use archguard::drc::{aggregate, ViolationDetails};
use archguard::prelude::*;
use archguard::{RulesEngine, RESULTS_FILE};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> Diagram {
    ArchGuardCore::load_diagram(&fixture_path(name)).expect("fixture should load")
}

fn check(name: &str) -> DrcResult {
    ArchGuardCore::run_check(&load(name), &DrcOptions::default()).expect("check should run")
}

fn of_rule(result: &DrcResult, rule: RuleId) -> Vec<&DrcViolation> {
    result
        .violations
        .iter()
        .filter(|v| v.rule_id() == rule)
        .collect()
}

#[test]
fn test_valid_soc_passes_clean() {
    let result = check("valid_soc.json");
    assert!(result.passed);
    assert!(
        result.violations.is_empty(),
        "unexpected violations: {:?}",
        result
            .violations
            .iter()
            .map(|v| &v.description)
            .collect::<Vec<_>>()
    );
    assert!(result.total_checks > 0);
}

#[test]
fn test_optional_ports_on_request() {
    let options = DrcOptions {
        check_optional_ports: true,
        ..DrcOptions::default()
    };
    let result = ArchGuardCore::run_check(&load("valid_soc.json"), &options).unwrap();
    let unconnected = of_rule(&result, RuleId::Conn001);
    assert_eq!(unconnected.len(), 1);
    assert_eq!(unconnected[0].affected_interfaces, vec!["uart0.irq"]);
    assert!(result.passed, "warnings must not fail the run");
}

#[test]
fn test_width_mismatch_reported_once() {
    let result = check("width_mismatch.json");
    let data = of_rule(&result, RuleId::Axi001);
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].severity, Severity::Critical);
    assert_eq!(data[0].affected_components, vec!["cpu0", "mem0"]);
    assert_eq!(data[0].affected_connections, vec!["e1"]);
    match &data[0].details {
        ViolationDetails::DataWidth(m) => {
            assert_eq!((m.source_width, m.target_width), (32, 64));
        }
        other => panic!("unexpected details: {:?}", other),
    }

    assert!(of_rule(&result, RuleId::Axi002).is_empty());
    assert_eq!(of_rule(&result, RuleId::Axi003).len(), 1);
    assert!(!result.passed);
}

#[test]
fn test_reversed_duplicate_edge_does_not_double_report() {
    let mut diagram = load("width_mismatch.json");
    let e1 = diagram.edges[0].clone();
    diagram.edges.push(Edge {
        id: "e1-back".to_string(),
        ..e1.reversed()
    });
    diagram.edges.push(Edge {
        id: "e1-copy".to_string(),
        ..e1
    });

    let report = ArchGuardCore::validate_diagram(&diagram);
    assert!(report.is_valid);
    assert_eq!(report.issues.len(), 2);

    let result = ArchGuardCore::run_check(&diagram, &DrcOptions::default()).unwrap();
    let direct = check("width_mismatch.json");
    assert_eq!(of_rule(&result, RuleId::Axi001).len(), 1);
    assert_eq!(of_rule(&result, RuleId::Axi003).len(), 1);
    assert_eq!(of_rule(&result, RuleId::Perf001).len(), 1);
    assert_eq!(result.summary, direct.summary);
}

#[test]
fn test_clock_domain_crossing_uses_interface_then_node() {
    let result = check("width_mismatch.json");
    let crossings = of_rule(&result, RuleId::Perf001);
    assert_eq!(crossings.len(), 1);
    match &crossings[0].details {
        ViolationDetails::ClockDomainCrossing {
            source_domain,
            target_domain,
            ..
        } => {
            assert_eq!(source_domain, "cpu_clk");
            assert_eq!(target_domain, "ddr_clk");
        }
        other => panic!("unexpected details: {:?}", other),
    }
}

#[test]
fn test_address_map_rules() {
    let result = check("address_map.json");

    let overlaps = of_rule(&result, RuleId::Addr001);
    let pairs: Vec<Vec<String>> = overlaps
        .iter()
        .map(|v| v.affected_components.clone())
        .collect();
    assert_eq!(
        pairs,
        vec![
            vec!["rom0".to_string(), "sram0".to_string()],
            vec!["sram0".to_string(), "sram1".to_string()],
        ]
    );
    // [0x1000, 0x2000) and [0x2000, 0x3000) only touch
    assert!(!pairs.contains(&vec!["rom0".to_string(), "sram1".to_string()]));

    let malformed = of_rule(&result, RuleId::Addr002);
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].affected_components, vec!["flash0"]);

    let misaligned = of_rule(&result, RuleId::Addr003);
    assert_eq!(misaligned.len(), 1);
    assert_eq!(misaligned[0].affected_components, vec!["sram0"]);
    assert_eq!(misaligned[0].severity, Severity::Info);

    assert_eq!(result.summary.critical, 2);
    assert!(!result.passed);
}

#[test]
fn test_overlap_details() {
    let result = check("address_map.json");
    let first = of_rule(&result, RuleId::Addr001)[0];
    match &first.details {
        ViolationDetails::AddressOverlap {
            first,
            second,
            overlap_start,
            overlap_end,
        } => {
            assert_eq!(first.node_id, "rom0");
            assert_eq!(second.node_id, "sram0");
            assert_eq!(overlap_start, "0x00001800");
            assert_eq!(overlap_end, "0x00002000");
        }
        other => panic!("unexpected details: {:?}", other),
    }
}

#[test]
fn test_cycle_detected_once() {
    let result = check("bus_cycle.json");
    let cycles = of_rule(&result, RuleId::Topo002);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].affected_components, vec!["A", "B", "C"]);
    assert!(!result.passed);
    assert_eq!(result.summary.critical, 1);
}

#[test]
fn test_naming_rules() {
    let diagram = load("valid_soc.json");
    let mut renamed = diagram.clone();
    renamed.nodes[0].properties.label = Some("1st core".to_string());
    renamed.nodes[1].properties.label = Some("UART".to_string());

    let result = ArchGuardCore::run_check(&renamed, &DrcOptions::default()).unwrap();
    let bad_names = of_rule(&result, RuleId::Name001);
    assert_eq!(bad_names.len(), 1);
    assert_eq!(bad_names[0].affected_components, vec!["cpu0"]);

    let shared = of_rule(&result, RuleId::Name002);
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].affected_components, vec!["dma0", "uart0"]);
    assert!(result.passed);
}

#[test]
fn test_custom_naming_pattern() {
    let options = DrcOptions::from_json(r#"{"namingPattern": "^[a-z0-9_]+$"}"#).unwrap();
    let result = ArchGuardCore::run_check(&load("width_mismatch.json"), &options).unwrap();
    // labels "CPU" and "DDR" are upper case
    assert_eq!(of_rule(&result, RuleId::Name001).len(), 2);
}

#[test]
fn test_bandwidth_oversubscription() {
    let mut diagram = load("valid_soc.json");
    let xbar = diagram.nodes.iter_mut().find(|n| n.id == "xbar").unwrap();
    xbar.properties.bandwidth_capacity = Some(2000.0);

    let result = ArchGuardCore::run_check(&diagram, &DrcOptions::default()).unwrap();
    let over = of_rule(&result, RuleId::Perf002);
    assert_eq!(over.len(), 1);
    assert_eq!(over[0].affected_components, vec!["xbar", "cpu0", "dma0"]);
    match &over[0].details {
        ViolationDetails::BandwidthOversubscribed { demand, capacity, .. } => {
            assert_eq!(*demand, 2400.0);
            assert_eq!(*capacity, 2000.0);
        }
        other => panic!("unexpected details: {:?}", other),
    }
}

#[test]
fn test_structurally_invalid_diagram_is_rejected() {
    let err = ArchGuardCore::run_check(&load("broken_edges.json"), &DrcOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ArchGuardError::StructurallyInvalid { count: 2, .. }
    ));
}

#[test]
fn test_engine_does_not_mutate_diagram() {
    let diagram = load("width_mismatch.json");
    let before = diagram.clone();
    RulesEngine::with_default_rules()
        .analyze(&diagram, &DrcOptions::default())
        .unwrap();
    assert_eq!(diagram, before);
}

#[test]
fn test_runs_are_deterministic_apart_from_timestamp() {
    let a = check("address_map.json");
    let b = check("address_map.json");
    assert_eq!(a.violations, b.violations);
    assert_eq!(a.total_checks, b.total_checks);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn test_passed_follows_critical_count() {
    for name in ["valid_soc.json", "width_mismatch.json", "address_map.json", "bus_cycle.json"] {
        let result = check(name);
        assert_eq!(result.passed, result.summary.critical == 0, "{}", name);
        assert_eq!(result.summary.total(), result.violations.len(), "{}", name);

        let rebuilt = aggregate(result.violations.clone(), result.total_checks);
        assert_eq!(rebuilt.summary, result.summary);
    }
}

#[test]
fn test_result_file_round_trip() {
    let result = check("width_mismatch.json");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(RESULTS_FILE);
    ArchGuardCore::save_result(&path, &result).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["passed"], false);
    assert_eq!(json["violations"][0]["ruleId"], "AXI-001");
    assert!(json["violations"][0]["affectedComponents"].is_array());

    assert_eq!(ArchGuardCore::load_result(&path).unwrap(), result);
}
