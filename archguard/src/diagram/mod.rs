//! Diagram Model
//!
//! The SoC architecture graph as it is exchanged with the editor: IP-block
//! nodes carrying bus interfaces, and edges joining an interface on one node
//! to an interface on another. Serialized field names follow the editor's
//! camelCase JSON (`arch_diagram.json`).

pub mod graph;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub use graph::{orient, BusGraph, Connection, Endpoint, PortRole};

/// Functional category of an IP block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeCategory {
    #[serde(rename = "CPU")]
    Cpu,
    Memory,
    #[serde(rename = "IO")]
    Io,
    Interconnect,
    Accelerator,
    #[default]
    #[serde(other)]
    Custom,
}

/// Canvas coordinates of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True when both axes agree within `epsilon`.
    pub fn approx_eq(&self, other: &Position, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Position {
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Declared direction of a bus interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Master,
    Slave,
    Input,
    Output,
    Bidirectional,
}

impl Direction {
    pub fn role(self) -> PortRole {
        match self {
            Direction::Master | Direction::Output => PortRole::Initiator,
            Direction::Slave | Direction::Input => PortRole::Responder,
            Direction::Bidirectional => PortRole::Either,
        }
    }
}

/// Side of the node box an interface is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    North,
    South,
    East,
    West,
}

/// A bus port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bus_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr_width: Option<u32>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_domain: Option<String>,
}

impl Interface {
    pub fn new(id: impl Into<String>, bus_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            bus_type: bus_type.into(),
            direction: None,
            id_width: None,
            data_width: None,
            addr_width: None,
            optional: false,
            placement: None,
            clock_domain: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_widths(mut self, data: u32, addr: u32, id: u32) -> Self {
        self.data_width = Some(data);
        self.addr_width = Some(addr);
        self.id_width = Some(id);
        self
    }

    pub fn with_clock_domain(mut self, domain: impl Into<String>) -> Self {
        self.clock_domain = Some(domain.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn role(&self) -> PortRole {
        self.direction.map(Direction::role).unwrap_or(PortRole::Unknown)
    }
}

/// Typed view of the node property bag.
///
/// Keys the checks understand are lifted into fields; anything else the
/// editor stores is kept in `extra` so it survives a load/fix/save cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_domain: Option<String>,
    /// Declared outbound bandwidth demand in MB/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f64>,
    /// Declared inbound bandwidth capacity in MB/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_capacity: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An IP block on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub category: NodeCategory,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub properties: NodeProperties,
}

impl Node {
    pub fn new(id: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            category,
            position: Position::default(),
            interfaces: Vec::new(),
            properties: NodeProperties::default(),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.properties.label = Some(label.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.properties.kind = Some(kind.into());
        self
    }

    pub fn with_address(mut self, base: impl Into<String>, size: impl Into<String>) -> Self {
        self.properties.base_address = Some(base.into());
        self.properties.address_size = Some(size.into());
        self
    }

    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn interface(&self, id: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    pub fn has_interface(&self, id: &str) -> bool {
        self.interface(id).is_some()
    }

    /// Name shown on the canvas: the label when set, the id otherwise.
    pub fn display_name(&self) -> &str {
        self.properties
            .label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(self.id.as_str())
    }

    /// Clock domain of an interface, falling back to the node-wide domain.
    pub fn clock_domain_of<'a>(&'a self, interface: &'a Interface) -> Option<&'a str> {
        interface
            .clock_domain
            .as_deref()
            .or(self.properties.clock_domain.as_deref())
    }

    /// Declares at least one of `baseAddress` / `addressSize`.
    pub fn is_memory_mapped(&self) -> bool {
        self.properties.base_address.is_some() || self.properties.address_size.is_some()
    }
}

/// A connection from an interface on `source` to an interface on `target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: String,
    #[serde(default)]
    pub target_handle: String,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: source_handle.into(),
            target_handle: target_handle.into(),
        }
    }

    /// (source, sourceHandle, target, targetHandle)
    pub fn key(&self) -> EdgeKey<'_> {
        (
            self.source.as_str(),
            self.source_handle.as_str(),
            self.target.as_str(),
            self.target_handle.as_str(),
        )
    }

    pub fn reversed_key(&self) -> EdgeKey<'_> {
        (
            self.target.as_str(),
            self.target_handle.as_str(),
            self.source.as_str(),
            self.source_handle.as_str(),
        )
    }

    /// Swap both endpoints and their handles.
    pub fn reversed(&self) -> Edge {
        Edge {
            id: self.id.clone(),
            source: self.target.clone(),
            target: self.source.clone(),
            source_handle: self.target_handle.clone(),
            target_handle: self.source_handle.clone(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

pub type EdgeKey<'a> = (&'a str, &'a str, &'a str, &'a str);

/// The whole architecture graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Diagram {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// First node carrying `id`.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All node positions grouped by id, in diagram order.
    pub fn nodes_by_id(&self) -> HashMap<&str, Vec<usize>> {
        let mut map: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            map.entry(node.id.as_str()).or_default().push(idx);
        }
        map
    }

    /// Resolve an edge endpoint to the (node, interface) it refers to.
    pub fn resolve(&self, node_id: &str, handle: &str) -> Option<(&Node, &Interface)> {
        self.nodes
            .iter()
            .filter(|n| n.id == node_id)
            .find_map(|n| n.interface(handle).map(|i| (n, i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_editor_json() {
        let json = r#"{
            "nodes": [{
                "id": "cpu0",
                "category": "CPU",
                "position": {"x": 10.0, "y": 20.0},
                "interfaces": [{
                    "id": "m0", "name": "M_AXI", "busType": "AXI4",
                    "direction": "master", "dataWidth": 64, "addrWidth": 32,
                    "placement": "east"
                }],
                "properties": {"label": "Cortex-A53", "type": "cpu", "vendor": "arm"}
            }],
            "edges": [{"id": "e1", "source": "cpu0", "target": "mem0",
                       "sourceHandle": "m0", "targetHandle": "s0"}]
        }"#;

        let diagram: Diagram = serde_json::from_str(json).unwrap();
        let cpu = &diagram.nodes[0];
        assert_eq!(cpu.category, NodeCategory::Cpu);
        assert_eq!(cpu.interfaces[0].direction, Some(Direction::Master));
        assert_eq!(cpu.interfaces[0].data_width, Some(64));
        assert_eq!(cpu.properties.kind.as_deref(), Some("cpu"));
        assert_eq!(
            cpu.properties.extra.get("vendor"),
            Some(&serde_json::json!("arm"))
        );
        assert_eq!(diagram.edges[0].source_handle, "m0");
    }

    #[test]
    fn test_unknown_category_is_custom() {
        let node: Node = serde_json::from_str(r#"{"id": "x", "category": "DSP"}"#).unwrap();
        assert_eq!(node.category, NodeCategory::Custom);
    }

    #[test]
    fn test_extra_properties_survive_roundtrip() {
        let json = r##"{"id": "n", "properties": {"label": "N", "color": "#fff"}}"##;
        let node: Node = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["properties"]["color"], "#fff");
        assert_eq!(back["properties"]["label"], "N");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let node = Node::new("uart0", NodeCategory::Io);
        assert_eq!(node.display_name(), "uart0");
        let node = node.with_label("UART");
        assert_eq!(node.display_name(), "UART");
    }

    #[test]
    fn test_edge_reversed_key() {
        let edge = Edge::new("e", "a", "m", "b", "s");
        assert_eq!(edge.reversed().key(), edge.reversed_key());
        assert!(!edge.is_self_loop());
    }

    #[test]
    fn test_interface_clock_domain_overrides_node() {
        let mut node = Node::new("dma", NodeCategory::Accelerator)
            .with_interface(Interface::new("m0", "AXI4").with_clock_domain("fast"))
            .with_interface(Interface::new("s0", "APB"));
        node.properties.clock_domain = Some("slow".to_string());
        assert_eq!(node.clock_domain_of(&node.interfaces[0]), Some("fast"));
        assert_eq!(node.clock_domain_of(&node.interfaces[1]), Some("slow"));
    }
}
