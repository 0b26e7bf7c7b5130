//! Structural Validator
//!
//! Scans a diagram for duplicate node ids, edges that do not resolve,
//! self-loops and repeated connections. Every finding carries the auto-fix the
//! reconciler will apply for it.

use std::collections::HashMap;

use crate::diagram::{orient, Diagram, Edge, EdgeKey, Node};

use super::{
    AutoFix, DuplicateInstance, DuplicateStrategy, EdgeEndpoint, IssueKind, IssueSeverity,
    ValidationIssue, ValidationReport,
};

/// Positions closer than this on both axes count as the same spot.
pub const POSITION_EPSILON: f64 = 0.01;

/// Run every structural check over `diagram`.
pub fn validate_diagram(diagram: &Diagram) -> ValidationReport {
    let mut issues = check_duplicate_nodes(diagram);
    issues.extend(check_edges(diagram));

    let is_valid = !issues.iter().any(ValidationIssue::is_error);
    tracing::debug!(
        nodes = diagram.nodes.len(),
        edges = diagram.edges.len(),
        issues = issues.len(),
        is_valid,
        "structural validation finished"
    );

    ValidationReport { is_valid, issues }
}

fn check_duplicate_nodes(diagram: &Diagram) -> Vec<ValidationIssue> {
    // groups in first-occurrence order
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, node) in diagram.nodes.iter().enumerate() {
        let entry = groups.entry(node.id.as_str()).or_default();
        if entry.is_empty() {
            order.push(node.id.as_str());
        }
        entry.push(idx);
    }

    let mut issues = Vec::new();
    for id in order {
        let members = &groups[id];
        if members.len() < 2 {
            continue;
        }
        let nodes: Vec<&Node> = members.iter().map(|&i| &diagram.nodes[i]).collect();
        let strategy = classify_duplicates(&nodes);
        let instances = members
            .iter()
            .map(|&index| {
                let node = &diagram.nodes[index];
                DuplicateInstance {
                    index,
                    position: node.position,
                    label: node.properties.label.clone(),
                    kind: node.properties.kind.clone(),
                    interface_count: node.interfaces.len(),
                }
            })
            .collect();

        let description = match strategy {
            DuplicateStrategy::DifferentPosition => format!(
                "{} nodes share id '{}' at different positions; extra instances will be renamed",
                members.len(),
                id
            ),
            DuplicateStrategy::ExactDuplicate => format!(
                "{} identical copies of node '{}' are stacked at the same position; extra copies will be removed",
                members.len(),
                id
            ),
            DuplicateStrategy::SamePositionDifferentProps => format!(
                "{} different nodes share id '{}' at the same position; extra instances will be renamed and moved apart",
                members.len(),
                id
            ),
        };

        issues.push(ValidationIssue {
            kind: IssueKind::DuplicateNodeId {
                node_id: id.to_string(),
                strategy,
                instances,
            },
            severity: IssueSeverity::Error,
            description,
            auto_fix: Some(strategy.auto_fix()),
        });
    }
    issues
}

/// Pick the resolution strategy for a group of nodes sharing one id.
pub fn classify_duplicates(nodes: &[&Node]) -> DuplicateStrategy {
    let Some((first, rest)) = nodes.split_first() else {
        return DuplicateStrategy::ExactDuplicate;
    };

    if rest
        .iter()
        .any(|n| !n.position.approx_eq(&first.position, POSITION_EPSILON))
    {
        return DuplicateStrategy::DifferentPosition;
    }

    let same_props = rest.iter().all(|n| {
        n.properties.label == first.properties.label
            && n.properties.kind == first.properties.kind
            && n.interfaces.len() == first.interfaces.len()
    });
    if same_props {
        DuplicateStrategy::ExactDuplicate
    } else {
        DuplicateStrategy::SamePositionDifferentProps
    }
}

fn check_edges(diagram: &Diagram) -> Vec<ValidationIssue> {
    let by_id = diagram.nodes_by_id();
    let has_handle = |node_id: &str, handle: &str| {
        by_id
            .get(node_id)
            .map(|idxs| idxs.iter().any(|&i| diagram.nodes[i].has_interface(handle)))
            .unwrap_or(false)
    };

    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut first_seen: HashMap<EdgeKey<'_>, usize> = HashMap::new();

    for (edge_index, edge) in diagram.edges.iter().enumerate() {
        let dangling = if !by_id.contains_key(edge.source.as_str()) {
            Some((EdgeEndpoint::Source, edge.source.clone()))
        } else if !by_id.contains_key(edge.target.as_str()) {
            Some((EdgeEndpoint::Target, edge.target.clone()))
        } else if !has_handle(&edge.source, &edge.source_handle) {
            Some((EdgeEndpoint::SourceHandle, edge.source_handle.clone()))
        } else if !has_handle(&edge.target, &edge.target_handle) {
            Some((EdgeEndpoint::TargetHandle, edge.target_handle.clone()))
        } else {
            None
        };

        if let Some((endpoint, reference)) = dangling {
            let what = match endpoint {
                EdgeEndpoint::Source => format!("source node '{}' does not exist", reference),
                EdgeEndpoint::Target => format!("target node '{}' does not exist", reference),
                EdgeEndpoint::SourceHandle => format!(
                    "interface '{}' not found on source node '{}'",
                    reference, edge.source
                ),
                EdgeEndpoint::TargetHandle => format!(
                    "interface '{}' not found on target node '{}'",
                    reference, edge.target
                ),
            };
            issues.push(ValidationIssue {
                kind: IssueKind::DanglingEdge {
                    edge_id: edge.id.clone(),
                    edge_index,
                    endpoint,
                    reference,
                },
                severity: IssueSeverity::Error,
                description: format!("Edge '{}' is dangling: {}", edge.id, what),
                auto_fix: Some(AutoFix::Remove),
            });
            continue;
        }

        if edge.is_self_loop() {
            issues.push(ValidationIssue {
                kind: IssueKind::SelfLoop {
                    edge_id: edge.id.clone(),
                    edge_index,
                    node_id: edge.source.clone(),
                },
                severity: IssueSeverity::Warning,
                description: format!(
                    "Edge '{}' connects node '{}' to itself",
                    edge.id, edge.source
                ),
                auto_fix: Some(AutoFix::Remove),
            });
            continue;
        }

        if let Some(&first) = first_seen.get(&edge.key()) {
            issues.push(duplicate_issue(
                edge,
                edge_index,
                &diagram.edges[first],
                false,
                AutoFix::RemoveDuplicate,
            ));
            continue;
        }

        if let Some(&first) = first_seen.get(&edge.reversed_key()) {
            let original = &diagram.edges[first];
            if runs_against_bus(diagram, edge) {
                issues.push(duplicate_issue(edge, edge_index, original, true, AutoFix::Reverse));
            } else if runs_against_bus(diagram, original) {
                issues.push(duplicate_issue(original, first, edge, true, AutoFix::Reverse));
            } else {
                issues.push(duplicate_issue(
                    edge,
                    edge_index,
                    original,
                    true,
                    AutoFix::RemoveDuplicate,
                ));
            }
        }

        first_seen.entry(edge.key()).or_insert(edge_index);
    }

    // a reverse fix may point back at an earlier edge
    issues.sort_by_key(|i| i.edge_index());
    issues
}

fn duplicate_issue(
    edge: &Edge,
    edge_index: usize,
    other: &Edge,
    reversed: bool,
    fix: AutoFix,
) -> ValidationIssue {
    let description = if reversed {
        format!(
            "Edge '{}' repeats connection '{}' in the opposite direction",
            edge.id, other.id
        )
    } else {
        format!("Edge '{}' duplicates connection '{}'", edge.id, other.id)
    };
    ValidationIssue {
        kind: IssueKind::DuplicateEdge {
            edge_id: edge.id.clone(),
            edge_index,
            duplicate_of: other.id.clone(),
            reversed,
        },
        severity: IssueSeverity::Warning,
        description,
        auto_fix: Some(fix),
    }
}

/// True when the edge is declared from the responding side to the initiating side.
fn runs_against_bus(diagram: &Diagram, edge: &Edge) -> bool {
    let source = diagram.resolve(&edge.source, &edge.source_handle);
    let target = diagram.resolve(&edge.target, &edge.target_handle);
    match (source, target) {
        (Some((_, s)), Some((_, t))) => orient(s.role(), t.role()) == Some(false),
        _ => false,
    }
}
