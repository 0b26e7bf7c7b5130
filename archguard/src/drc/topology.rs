use std::collections::HashSet;

use crate::diagram::{Connection, Endpoint, NodeCategory, PortRole};

use super::rules::{Rule, RuleContext, RuleOutcome};
use super::{interface_ref, DrcViolation, RuleId, ViolationDetails};

/// Several masters driving one slave port without an interconnect between them
pub struct FanInRule;

impl Rule for FanInRule {
    fn id(&self) -> RuleId {
        RuleId::Topo001
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for (node_idx, node) in ctx.diagram().nodes.iter().enumerate() {
            if node.category == NodeCategory::Interconnect {
                continue;
            }
            for (iface_idx, iface) in node.interfaces.iter().enumerate() {
                if iface.role() != PortRole::Responder {
                    continue;
                }
                outcome.checked();

                let here = Endpoint {
                    node: node_idx,
                    interface: iface_idx,
                };
                let feeding = ctx
                    .graph
                    .connections()
                    .iter()
                    .filter(|c| matches!(c.oriented, Some((_, slave)) if slave == here));
                let Feeders { nodes, masters, edges } = distinct_masters(ctx, feeding);
                if masters.len() < 2 {
                    continue;
                }

                outcome.push(
                    DrcViolation::new(
                        ViolationDetails::UnarbitratedFanIn {
                            node_id: node.id.clone(),
                            interface_id: iface.id.clone(),
                            masters: masters.clone(),
                        },
                        interface_ref(&node.id, &iface.id),
                        format!(
                            "Slave interface '{}' on '{}' is driven by {} masters without arbitration: {}",
                            iface.name,
                            node.display_name(),
                            masters.len(),
                            masters.join(", ")
                        ),
                        "Route the masters through an interconnect or arbiter",
                    )
                    .with_components(std::iter::once(node.id.as_str()).chain(nodes))
                    .with_interfaces(
                        std::iter::once(interface_ref(&node.id, &iface.id))
                            .chain(masters.iter().cloned()),
                    )
                    .with_connections(edges),
                );
            }
        }
        outcome
    }
}

struct Feeders<'a> {
    nodes: Vec<&'a str>,
    masters: Vec<String>,
    edges: Vec<String>,
}

/// Distinct initiator interfaces among `conns`, with the edges that carry them.
fn distinct_masters<'a, 'c>(
    ctx: &RuleContext<'a>,
    conns: impl Iterator<Item = &'c Connection>,
) -> Feeders<'a> {
    let mut seen = HashSet::new();
    let mut feeders = Feeders {
        nodes: Vec::new(),
        masters: Vec::new(),
        edges: Vec::new(),
    };
    for conn in conns {
        let Some((master, _)) = conn.oriented else {
            continue;
        };
        if ctx.graph.interface(master).role() != PortRole::Initiator {
            continue;
        }
        feeders.edges.push(ctx.graph.edge(conn.edge_index).id.clone());
        if seen.insert(master) {
            let node = ctx.graph.node(master.node);
            feeders.nodes.push(node.id.as_str());
            feeders
                .masters
                .push(interface_ref(&node.id, &ctx.graph.interface(master).id));
        }
    }
    feeders
}

/// Loops in the master→slave graph
pub struct BusCycleRule;

impl Rule for BusCycleRule {
    fn id(&self) -> RuleId {
        RuleId::Topo002
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        outcome.checked();

        for cycle in ctx.graph.find_cycles() {
            let path: Vec<String> = cycle
                .iter()
                .map(|&idx| ctx.graph.node(idx).id.clone())
                .collect();

            let mut edges = Vec::new();
            for (pos, &from) in cycle.iter().enumerate() {
                let to = cycle[(pos + 1) % cycle.len()];
                edges.extend(
                    ctx.graph
                        .connections()
                        .iter()
                        .filter(|c| {
                            matches!(c.oriented, Some((m, s)) if m.node == from && s.node == to)
                        })
                        .map(|c| ctx.graph.edge(c.edge_index).id.clone()),
                );
            }

            let mut shown = path.clone();
            if let Some(first) = path.first() {
                shown.push(first.clone());
            }
            outcome.push(
                DrcViolation::new(
                    ViolationDetails::BusCycle { path: path.clone() },
                    format!("cycle {}", path.join(" -> ")),
                    format!("Bus topology contains a loop: {}", shown.join(" -> ")),
                    "Break the loop; transactions that can return to their initiator risk deadlock",
                )
                .with_components(path.iter().map(String::as_str))
                .with_connections(edges),
            );
        }
        outcome
    }
}
