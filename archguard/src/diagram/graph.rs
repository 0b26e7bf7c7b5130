//! Bus Graph
//!
//! A resolved, read-only view of a diagram: every edge is matched to the
//! interfaces it joins and, where the interface directions allow it, oriented
//! from the initiating (master) side to the responding (slave) side. The
//! oriented connections are also loaded into a petgraph `DiGraph` so that the
//! topology checks can walk master→slave paths.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as GraphDirection;
use std::collections::{HashMap, HashSet};

use super::{Diagram, Edge, Interface, Node};

/// Transaction role of an interface, derived from its declared direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// master / output
    Initiator,
    /// slave / input
    Responder,
    /// bidirectional
    Either,
    /// no direction declared
    Unknown,
}

/// One end of a resolved edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub node: usize,
    pub interface: usize,
}

/// An edge whose endpoints both resolve to existing interfaces.
///
/// Edges joining the same pair of interfaces, in either direction, share the
/// connection of the first such edge.
#[derive(Debug, Clone)]
pub struct Connection {
    pub edge_index: usize,
    pub source: Endpoint,
    pub target: Endpoint,
    /// `(master, slave)` when the directions of both ends determine it
    pub oriented: Option<(Endpoint, Endpoint)>,
}

impl Connection {
    /// Ends ordered initiator first, falling back to the declared direction.
    pub fn flow(&self) -> (Endpoint, Endpoint) {
        self.oriented.unwrap_or((self.source, self.target))
    }
}

/// An edge that does not resolve, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub edge_index: usize,
    pub missing: String,
}

/// Resolved graph view over a diagram with unique node ids
#[derive(Debug)]
pub struct BusGraph<'a> {
    diagram: &'a Diagram,
    node_indices: HashMap<&'a str, usize>,
    connections: Vec<Connection>,
    unresolved: Vec<Unresolved>,
    topology: DiGraph<usize, usize>,
}

impl<'a> BusGraph<'a> {
    pub fn new(diagram: &'a Diagram) -> Self {
        let mut node_indices = HashMap::new();
        for (idx, node) in diagram.nodes.iter().enumerate() {
            node_indices.entry(node.id.as_str()).or_insert(idx);
        }

        let mut graph = Self {
            diagram,
            node_indices,
            connections: Vec::new(),
            unresolved: Vec::new(),
            topology: DiGraph::new(),
        };

        let mut joined: HashSet<(Endpoint, Endpoint)> = HashSet::new();
        for (edge_index, edge) in diagram.edges.iter().enumerate() {
            match graph.resolve_edge(edge) {
                Ok((source, target)) => {
                    if !joined.insert((source.min(target), source.max(target))) {
                        tracing::debug!(edge_id = %edge.id, "edge repeats an existing connection");
                        continue;
                    }
                    let oriented = orient(
                        graph.interface(source).role(),
                        graph.interface(target).role(),
                    )
                    .map(|forward| {
                        if forward {
                            (source, target)
                        } else {
                            (target, source)
                        }
                    });
                    graph.connections.push(Connection {
                        edge_index,
                        source,
                        target,
                        oriented,
                    });
                }
                Err(missing) => graph.unresolved.push(Unresolved {
                    edge_index,
                    missing,
                }),
            }
        }

        graph.build_topology();
        graph
    }

    fn resolve_edge(&self, edge: &Edge) -> Result<(Endpoint, Endpoint), String> {
        let source = self.endpoint(&edge.source, &edge.source_handle)?;
        let target = self.endpoint(&edge.target, &edge.target_handle)?;
        Ok((source, target))
    }

    fn endpoint(&self, node_id: &str, handle: &str) -> Result<Endpoint, String> {
        let &node = self
            .node_indices
            .get(node_id)
            .ok_or_else(|| format!("node '{}'", node_id))?;
        let interface = self.diagram.nodes[node]
            .interfaces
            .iter()
            .position(|i| i.id == handle)
            .ok_or_else(|| format!("interface '{}' on node '{}'", handle, node_id))?;
        Ok(Endpoint { node, interface })
    }

    fn build_topology(&mut self) {
        let indices: Vec<NodeIndex> = (0..self.diagram.nodes.len())
            .map(|idx| self.topology.add_node(idx))
            .collect();
        for conn in &self.connections {
            if let Some((master, slave)) = conn.oriented {
                self.topology
                    .add_edge(indices[master.node], indices[slave.node], conn.edge_index);
            }
        }
    }

    pub fn diagram(&self) -> &'a Diagram {
        self.diagram
    }

    pub fn node(&self, idx: usize) -> &'a Node {
        &self.diagram.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &'a Edge {
        &self.diagram.edges[idx]
    }

    pub fn interface(&self, end: Endpoint) -> &'a Interface {
        &self.diagram.nodes[end.node].interfaces[end.interface]
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn unresolved(&self) -> &[Unresolved] {
        &self.unresolved
    }

    /// Every interface that at least one resolved edge touches.
    pub fn connected_endpoints(&self) -> HashSet<Endpoint> {
        self.connections
            .iter()
            .flat_map(|c| [c.source, c.target])
            .collect()
    }

    /// Oriented connections arriving at `node`, in edge order.
    pub fn inbound(&self, node: usize) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.flow().1.node == node)
            .collect()
    }

    /// Successors of `node` in the master→slave graph, in edge order.
    fn successors(&self, node: usize) -> Vec<usize> {
        let mut out: Vec<(usize, usize)> = self
            .topology
            .edges_directed(NodeIndex::new(node), GraphDirection::Outgoing)
            .map(|e| (*e.weight(), e.target().index()))
            .collect();
        out.sort_unstable();
        out.into_iter().map(|(_, target)| target).collect()
    }

    /// Cycles in the master→slave graph.
    ///
    /// Depth-first search from every unvisited node in diagram order with an
    /// explicit recursion stack; reaching a node that is still on the stack
    /// closes a cycle made of the stack slice from that node to the top.
    /// Cycles over the same set of nodes are reported once.
    pub fn find_cycles(&self) -> Vec<Vec<usize>> {
        let count = self.diagram.nodes.len();
        let mut visited = vec![false; count];
        let mut on_stack = vec![false; count];
        let mut cycles = Vec::new();
        let mut seen: HashSet<Vec<usize>> = HashSet::new();

        for start in 0..count {
            if visited[start] {
                continue;
            }
            // (node, successors, next successor to visit)
            let mut stack: Vec<(usize, Vec<usize>, usize)> = Vec::new();
            visited[start] = true;
            on_stack[start] = true;
            stack.push((start, self.successors(start), 0));

            while let Some(frame) = stack.last_mut() {
                let (node, succ, cursor) = (frame.0, &frame.1, frame.2);
                if cursor >= succ.len() {
                    on_stack[node] = false;
                    stack.pop();
                    continue;
                }
                let next = succ[cursor];
                frame.2 += 1;

                if on_stack[next] {
                    let begin = stack
                        .iter()
                        .position(|(n, _, _)| *n == next)
                        .unwrap_or(0);
                    let cycle: Vec<usize> = stack[begin..].iter().map(|(n, _, _)| *n).collect();
                    let mut key = cycle.clone();
                    key.sort_unstable();
                    if seen.insert(key) {
                        cycles.push(cycle);
                    }
                } else if !visited[next] {
                    visited[next] = true;
                    on_stack[next] = true;
                    let succ = self.successors(next);
                    stack.push((next, succ, 0));
                }
            }
        }

        cycles
    }
}

/// `Some(true)` when source→target already runs initiator to responder,
/// `Some(false)` when it runs the other way, `None` when undecidable.
pub fn orient(source: PortRole, target: PortRole) -> Option<bool> {
    use PortRole::*;
    match (source, target) {
        (Initiator, Responder) | (Initiator, Either) | (Either, Responder) => Some(true),
        (Responder, Initiator) | (Responder, Either) | (Either, Initiator) => Some(false),
        _ => None,
    }
}
