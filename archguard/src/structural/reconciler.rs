//! Auto-Fix Reconciler
//!
//! Rewrites a diagram so that the structural issues reported for it go away.
//! The input diagram is never touched; the caller gets a new value back and
//! should carry on with that one. Issues whose `autoFix` was cleared by the
//! caller are left alone.

use std::collections::{HashMap, HashSet};

use crate::diagram::{Diagram, Edge, Node};

use super::{AutoFix, IssueKind, ValidationIssue};

/// Canvas units each renamed same-position instance is shifted by, per axis.
pub const OFFSET_STEP: f64 = 50.0;

/// What happens to one node of the input diagram
#[derive(Debug, Clone, PartialEq)]
enum NodeFate {
    Keep,
    Drop,
    Rename { id: String, shift: Option<f64> },
}

/// What happens to one edge of the input diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeFate {
    Keep,
    Drop,
    Reverse,
}

/// Members of a resolved duplicate-id group, in diagram order
struct Group {
    members: Vec<usize>,
}

/// Apply the auto-fix of every issue to a copy of `diagram`.
pub fn apply_auto_fixes(diagram: &Diagram, issues: &[ValidationIssue]) -> Diagram {
    let mut node_fates = vec![NodeFate::Keep; diagram.nodes.len()];
    let mut edge_fates = vec![EdgeFate::Keep; diagram.edges.len()];
    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut taken: HashSet<String> = diagram.nodes.iter().map(|n| n.id.clone()).collect();

    for issue in issues {
        let Some(fix) = issue.auto_fix else {
            continue;
        };
        match &issue.kind {
            IssueKind::DuplicateNodeId {
                node_id, instances, ..
            } => {
                let members: Vec<usize> = instances.iter().map(|i| i.index).collect();
                if !group_matches(diagram, node_id, &members) {
                    tracing::warn!(
                        node_id = %node_id,
                        "duplicate-id issue does not match the diagram, skipping"
                    );
                    continue;
                }
                if groups.contains_key(node_id) {
                    continue;
                }
                if fix == AutoFix::Reverse {
                    tracing::warn!(node_id = %node_id, "reverse does not apply to nodes, skipping");
                    continue;
                }
                for (ordinal, &idx) in members.iter().enumerate().skip(1) {
                    node_fates[idx] = match fix {
                        AutoFix::Remove | AutoFix::RemoveDuplicate | AutoFix::Reverse => {
                            NodeFate::Drop
                        }
                        AutoFix::Rename => NodeFate::Rename {
                            id: fresh_id(node_id, ordinal, &mut taken),
                            shift: None,
                        },
                        AutoFix::OffsetPosition => NodeFate::Rename {
                            id: fresh_id(node_id, ordinal, &mut taken),
                            shift: Some(OFFSET_STEP * ordinal as f64),
                        },
                    };
                }
                groups.insert(node_id.clone(), Group { members });
            }
            IssueKind::DanglingEdge {
                edge_id, edge_index, ..
            }
            | IssueKind::SelfLoop {
                edge_id, edge_index, ..
            }
            | IssueKind::DuplicateEdge {
                edge_id, edge_index, ..
            } => {
                let matches = diagram
                    .edges
                    .get(*edge_index)
                    .map(|e| &e.id == edge_id)
                    .unwrap_or(false);
                if !matches {
                    tracing::warn!(
                        edge_id = %edge_id,
                        edge_index,
                        "edge issue does not match the diagram, skipping"
                    );
                    continue;
                }
                edge_fates[*edge_index] = match fix {
                    AutoFix::Remove | AutoFix::RemoveDuplicate => EdgeFate::Drop,
                    AutoFix::Reverse => EdgeFate::Reverse,
                    AutoFix::Rename | AutoFix::OffsetPosition => {
                        tracing::warn!(
                            edge_id = %edge_id,
                            "rename does not apply to edges, skipping"
                        );
                        continue;
                    }
                };
            }
        }
    }

    let nodes = rebuild_nodes(diagram, &node_fates);
    let edges = rebuild_edges(diagram, &edge_fates, &node_fates, &groups);

    tracing::info!(
        nodes_before = diagram.nodes.len(),
        nodes_after = nodes.len(),
        edges_before = diagram.edges.len(),
        edges_after = edges.len(),
        "auto-fix applied"
    );

    Diagram { nodes, edges }
}

fn group_matches(diagram: &Diagram, node_id: &str, members: &[usize]) -> bool {
    members.len() >= 2
        && members
            .iter()
            .all(|&idx| diagram.nodes.get(idx).map(|n| n.id == node_id).unwrap_or(false))
}

/// `"{id}-{n}"` for the smallest `n >= ordinal` not already in use.
fn fresh_id(base: &str, ordinal: usize, taken: &mut HashSet<String>) -> String {
    let mut n = ordinal;
    loop {
        let candidate = format!("{}-{}", base, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn rebuild_nodes(diagram: &Diagram, fates: &[NodeFate]) -> Vec<Node> {
    diagram
        .nodes
        .iter()
        .zip(fates)
        .filter_map(|(node, fate)| match fate {
            NodeFate::Keep => Some(node.clone()),
            NodeFate::Drop => None,
            NodeFate::Rename { id, shift } => {
                let mut renamed = node.clone();
                renamed.id = id.clone();
                if let Some(d) = shift {
                    renamed.position = node.position.offset(*d, *d);
                }
                Some(renamed)
            }
        })
        .collect()
}

/// Result of re-pointing one edge endpoint at a resolved duplicate group
enum Rewired {
    Unchanged,
    To(String),
    Lost,
}

/// Work out which group member an endpoint belonged to by the handle it uses.
/// The first member wins when several carry the handle, or when none does.
fn rewire(
    diagram: &Diagram,
    node_id: &str,
    handle: &str,
    node_fates: &[NodeFate],
    groups: &HashMap<String, Group>,
) -> Rewired {
    let Some(group) = groups.get(node_id) else {
        return Rewired::Unchanged;
    };
    let owner = group
        .members
        .iter()
        .copied()
        .find(|&idx| diagram.nodes[idx].has_interface(handle))
        .unwrap_or(group.members[0]);

    match &node_fates[owner] {
        NodeFate::Keep => Rewired::Unchanged,
        NodeFate::Drop => Rewired::Lost,
        NodeFate::Rename { id, .. } => Rewired::To(id.clone()),
    }
}

fn rebuild_edges(
    diagram: &Diagram,
    edge_fates: &[EdgeFate],
    node_fates: &[NodeFate],
    groups: &HashMap<String, Group>,
) -> Vec<Edge> {
    let mut survivors: Vec<(usize, Edge, bool)> = Vec::new();

    for (idx, (edge, fate)) in diagram.edges.iter().zip(edge_fates).enumerate() {
        let mut edge = match fate {
            EdgeFate::Drop => continue,
            EdgeFate::Keep => edge.clone(),
            EdgeFate::Reverse => edge.reversed(),
        };

        match rewire(diagram, &edge.source, &edge.source_handle, node_fates, groups) {
            Rewired::Unchanged => {}
            Rewired::To(id) => edge.source = id,
            Rewired::Lost => {
                tracing::debug!(
                    edge_id = %edge.id,
                    "edge belonged to a removed duplicate node, dropping"
                );
                continue;
            }
        }
        match rewire(diagram, &edge.target, &edge.target_handle, node_fates, groups) {
            Rewired::Unchanged => {}
            Rewired::To(id) => edge.target = id,
            Rewired::Lost => {
                tracing::debug!(
                    edge_id = %edge.id,
                    "edge belonged to a removed duplicate node, dropping"
                );
                continue;
            }
        }

        survivors.push((idx, edge, *fate == EdgeFate::Reverse));
    }

    // A reversed edge that now repeats a retained edge has nothing left to add.
    let mut keys: HashSet<(String, String, String, String)> = survivors
        .iter()
        .filter(|(_, _, reversed)| !reversed)
        .map(|(_, e, _)| owned_key(e))
        .collect();
    let mut dropped: HashSet<usize> = HashSet::new();
    for (idx, edge, reversed) in &survivors {
        if *reversed && !keys.insert(owned_key(edge)) {
            tracing::debug!(
                edge_id = %edge.id,
                "reversed edge collapses into an existing connection"
            );
            dropped.insert(*idx);
        }
    }

    survivors
        .into_iter()
        .filter(|(idx, _, _)| !dropped.contains(idx))
        .map(|(_, edge, _)| edge)
        .collect()
}

fn owned_key(edge: &Edge) -> (String, String, String, String) {
    (
        edge.source.clone(),
        edge.source_handle.clone(),
        edge.target.clone(),
        edge.target_handle.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{Direction, Interface, NodeCategory, Position};
    use crate::structural::validate_diagram;

    fn block(id: &str, x: f64, y: f64, iface: &str) -> Node {
        Node::new(id, NodeCategory::Custom)
            .with_position(x, y)
            .with_interface(Interface::new(iface, "AXI4").with_direction(Direction::Slave))
    }

    fn master(id: &str) -> Node {
        Node::new(id, NodeCategory::Cpu)
            .with_interface(Interface::new("m0", "AXI4").with_direction(Direction::Master))
    }

    #[test]
    fn test_no_issues_is_identity() {
        let diagram = Diagram::new()
            .with_node(master("cpu0"))
            .with_node(block("mem0", 0.0, 0.0, "s0"))
            .with_edge(Edge::new("e", "cpu0", "m0", "mem0", "s0"));
        assert_eq!(apply_auto_fixes(&diagram, &[]), diagram);
    }

    #[test]
    fn test_rename_moves_edges_by_handle() {
        let diagram = Diagram::new()
            .with_node(master("cpu0"))
            .with_node(block("bus", 0.0, 0.0, "s0"))
            .with_node(block("bus", 300.0, 0.0, "s1"))
            .with_edge(Edge::new("e0", "cpu0", "m0", "bus", "s0"))
            .with_edge(Edge::new("e1", "cpu0", "m0", "bus", "s1"));
        let issues = validate_diagram(&diagram).issues;
        let fixed = apply_auto_fixes(&diagram, &issues);

        assert_eq!(fixed.nodes[1].id, "bus");
        assert_eq!(fixed.nodes[2].id, "bus-1");
        assert_eq!(fixed.edges[0].target, "bus");
        assert_eq!(fixed.edges[1].target, "bus-1");
        assert!(validate_diagram(&fixed).is_clean());
    }

    #[test]
    fn test_fresh_id_skips_taken_names() {
        let diagram = Diagram::new()
            .with_node(block("n", 0.0, 0.0, "s"))
            .with_node(block("n", 100.0, 0.0, "s"))
            .with_node(block("n-1", 500.0, 0.0, "s"));
        let fixed = apply_auto_fixes(&diagram, &validate_diagram(&diagram).issues);

        let ids: Vec<&str> = fixed.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n", "n-2", "n-1"]);
    }

    #[test]
    fn test_offset_scales_with_instance() {
        let base = block("p", 200.0, 200.0, "s");
        let diagram = Diagram::new()
            .with_node(base.clone())
            .with_node(base.clone().with_kind("uart"))
            .with_node(base.with_kind("spi"));
        let fixed = apply_auto_fixes(&diagram, &validate_diagram(&diagram).issues);

        assert_eq!(fixed.nodes[1].id, "p-1");
        assert_eq!(fixed.nodes[1].position, Position::new(250.0, 250.0));
        assert_eq!(fixed.nodes[2].id, "p-2");
        assert_eq!(fixed.nodes[2].position, Position::new(300.0, 300.0));
    }

    #[test]
    fn test_reverse_collapses_into_forward_edge() {
        let diagram = Diagram::new()
            .with_node(master("cpu0"))
            .with_node(block("mem0", 0.0, 0.0, "s0"))
            .with_edge(Edge::new("back", "mem0", "s0", "cpu0", "m0"))
            .with_edge(Edge::new("fwd", "cpu0", "m0", "mem0", "s0"));
        let fixed = apply_auto_fixes(&diagram, &validate_diagram(&diagram).issues);

        assert_eq!(fixed.edges.len(), 1);
        assert_eq!(fixed.edges[0].id, "fwd");
        assert!(validate_diagram(&fixed).is_clean());
    }

    #[test]
    fn test_lone_reverse_just_swaps() {
        let diagram = Diagram::new()
            .with_node(master("cpu0"))
            .with_node(block("mem0", 0.0, 0.0, "s0"))
            .with_edge(Edge::new("back", "mem0", "s0", "cpu0", "m0"));
        let issue = ValidationIssue {
            kind: IssueKind::DuplicateEdge {
                edge_id: "back".to_string(),
                edge_index: 0,
                duplicate_of: "fwd".to_string(),
                reversed: true,
            },
            severity: crate::structural::IssueSeverity::Warning,
            description: String::new(),
            auto_fix: Some(AutoFix::Reverse),
        };
        let fixed = apply_auto_fixes(&diagram, &[issue]);

        assert_eq!(fixed.edges[0].source, "cpu0");
        assert_eq!(fixed.edges[0].source_handle, "m0");
        assert_eq!(fixed.edges[0].target, "mem0");
    }

    #[test]
    fn test_cleared_auto_fix_is_ignored() {
        let diagram = Diagram::new()
            .with_node(master("cpu0"))
            .with_edge(Edge::new("e", "cpu0", "m0", "ghost", "s0"));
        let mut issues = validate_diagram(&diagram).issues;
        issues[0].auto_fix = None;
        assert_eq!(apply_auto_fixes(&diagram, &issues), diagram);
    }

    #[test]
    fn test_stale_edge_issue_is_skipped() {
        let diagram = Diagram::new()
            .with_node(master("cpu0"))
            .with_edge(Edge::new("e", "cpu0", "m0", "ghost", "s0"));
        let mut issues = validate_diagram(&diagram).issues;
        if let IssueKind::DanglingEdge { edge_id, .. } = &mut issues[0].kind {
            *edge_id = "other".to_string();
        }
        assert_eq!(apply_auto_fixes(&diagram, &issues), diagram);
    }

    #[test]
    fn test_input_is_untouched() {
        let diagram = Diagram::new()
            .with_node(block("x", 0.0, 0.0, "s"))
            .with_node(block("x", 0.0, 0.0, "s"));
        let before = diagram.clone();
        let fixed = apply_auto_fixes(&diagram, &validate_diagram(&diagram).issues);
        assert_eq!(diagram, before);
        assert_eq!(fixed.nodes.len(), 1);
    }
}
