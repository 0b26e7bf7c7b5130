use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{ArchGuardError, DrcOptions};
use crate::diagram::{BusGraph, Connection, Diagram, Endpoint};

use super::address::{AddressAlignmentRule, AddressOverlapRule, MalformedAddressRule};
use super::topology::{BusCycleRule, FanInRule};
use super::{interface_ref, DrcViolation, RuleId, Severity, ViolationDetails, WidthMismatch};

/// Namespace for deterministic violation ids
const VIOLATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b7d_4c30_8e15_a2d3_c4b5_e6f7);

/// Everything a rule may look at
pub struct RuleContext<'a> {
    pub graph: BusGraph<'a>,
    pub options: &'a DrcOptions,
    pub naming: Regex,
}

impl<'a> RuleContext<'a> {
    pub fn new(diagram: &'a Diagram, options: &'a DrcOptions) -> Result<Self, ArchGuardError> {
        let naming = Regex::new(&options.naming_pattern).map_err(|e| {
            ArchGuardError::Config(format!(
                "invalid naming pattern '{}': {}",
                options.naming_pattern, e
            ))
        })?;
        Ok(Self {
            graph: BusGraph::new(diagram),
            options,
            naming,
        })
    }

    pub fn diagram(&self) -> &'a Diagram {
        self.graph.diagram()
    }

    /// `source.iface -> target.iface` for a connection
    pub fn describe(&self, conn: &Connection) -> String {
        let s = self.graph.node(conn.source.node);
        let t = self.graph.node(conn.target.node);
        format!(
            "{} -> {}",
            interface_ref(&s.id, &self.graph.interface(conn.source).id),
            interface_ref(&t.id, &self.graph.interface(conn.target).id)
        )
    }

    /// Attach both ends of a connection to a violation.
    pub fn attach(&self, violation: DrcViolation, conn: &Connection) -> DrcViolation {
        let s = self.graph.node(conn.source.node);
        let t = self.graph.node(conn.target.node);
        violation
            .with_components([s.id.as_str(), t.id.as_str()])
            .with_interfaces([
                interface_ref(&s.id, &self.graph.interface(conn.source).id),
                interface_ref(&t.id, &self.graph.interface(conn.target).id),
            ])
            .with_connections([self.graph.edge(conn.edge_index).id.as_str()])
    }
}

/// Result of evaluating one rule
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    /// Number of subjects the rule examined
    pub checks: usize,
    pub violations: Vec<DrcViolation>,
}

impl RuleOutcome {
    pub fn checked(&mut self) {
        self.checks += 1;
    }

    pub fn push(&mut self, violation: DrcViolation) {
        self.violations.push(violation);
    }
}

/// Result of evaluating the whole catalog
#[derive(Debug, Clone, Default)]
pub struct RuleRun {
    pub total_checks: usize,
    pub violations: Vec<DrcViolation>,
}

pub trait Rule: Send + Sync {
    fn id(&self) -> RuleId;

    fn name(&self) -> &str {
        self.id().name()
    }

    fn severity(&self) -> Severity {
        self.id().severity()
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome;
}

pub struct RulesEngine {
    rules: Vec<Arc<dyn Rule>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Arc::new(UnconnectedInterfaceRule));
        engine.add_rule(Arc::new(UnresolvedEndpointRule));
        engine.add_rule(Arc::new(MissingDirectionRule));
        engine.add_rule(Arc::new(BusTypeMismatchRule));
        engine.add_rule(Arc::new(WidthMatchRule::data_width()));
        engine.add_rule(Arc::new(WidthMatchRule::addr_width()));
        engine.add_rule(Arc::new(WidthMatchRule::id_width()));
        engine.add_rule(Arc::new(AddressOverlapRule));
        engine.add_rule(Arc::new(MalformedAddressRule));
        engine.add_rule(Arc::new(AddressAlignmentRule));
        engine.add_rule(Arc::new(FanInRule));
        engine.add_rule(Arc::new(BusCycleRule));
        engine.add_rule(Arc::new(ClockDomainRule));
        engine.add_rule(Arc::new(BandwidthRule));
        engine.add_rule(Arc::new(NamingConventionRule));
        engine.add_rule(Arc::new(DuplicateNameRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter()
    }

    /// Evaluate every enabled rule against `diagram`.
    ///
    /// Only fails when the options themselves are unusable; a diagram full of
    /// problems still produces a complete run.
    pub fn analyze(
        &self,
        diagram: &Diagram,
        options: &DrcOptions,
    ) -> Result<RuleRun, ArchGuardError> {
        let enabled = options.enabled_rules()?;
        let ctx = RuleContext::new(diagram, options)?;
        let mut run = RuleRun::default();

        for rule in &self.rules {
            if let Some(ref only) = enabled {
                if !only.contains(&rule.id()) {
                    continue;
                }
            }
            let outcome = rule.check(&ctx);
            tracing::debug!(
                rule = %rule.id(),
                checks = outcome.checks,
                violations = outcome.violations.len(),
                "rule evaluated"
            );
            run.total_checks += outcome.checks;
            run.violations.extend(outcome.violations);
        }

        for (ordinal, violation) in run.violations.iter_mut().enumerate() {
            violation.id = violation_id(ordinal, violation);
        }

        Ok(run)
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

fn violation_id(ordinal: usize, violation: &DrcViolation) -> String {
    let name = format!(
        "{}:{}:{}:{}",
        violation.rule_id(),
        ordinal,
        violation.affected_components.join(","),
        violation.affected_connections.join(",")
    );
    Uuid::new_v5(&VIOLATION_NAMESPACE, name.as_bytes()).to_string()
}

// Connectivity

pub struct UnconnectedInterfaceRule;

impl Rule for UnconnectedInterfaceRule {
    fn id(&self) -> RuleId {
        RuleId::Conn001
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        let connected = ctx.graph.connected_endpoints();

        for (node_idx, node) in ctx.diagram().nodes.iter().enumerate() {
            for (iface_idx, iface) in node.interfaces.iter().enumerate() {
                if iface.optional && !ctx.options.check_optional_ports {
                    continue;
                }
                outcome.checked();
                let end = Endpoint {
                    node: node_idx,
                    interface: iface_idx,
                };
                if connected.contains(&end) {
                    continue;
                }
                let what = if iface.optional { "Optional interface" } else { "Interface" };
                outcome.push(
                    DrcViolation::new(
                        ViolationDetails::UnconnectedInterface {
                            node_id: node.id.clone(),
                            interface_id: iface.id.clone(),
                            optional: iface.optional,
                        },
                        interface_ref(&node.id, &iface.id),
                        format!(
                            "{} '{}' ({}) on '{}' is not connected",
                            what,
                            iface.name,
                            iface.bus_type,
                            node.display_name()
                        ),
                        "Connect the interface or mark it optional if it may stay unused",
                    )
                    .with_components([node.id.as_str()])
                    .with_interfaces([interface_ref(&node.id, &iface.id)]),
                );
            }
        }
        outcome
    }
}

pub struct UnresolvedEndpointRule;

impl Rule for UnresolvedEndpointRule {
    fn id(&self) -> RuleId {
        RuleId::Conn002
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome {
            checks: ctx.diagram().edges.len(),
            violations: Vec::new(),
        };
        for unresolved in ctx.graph.unresolved() {
            let edge = ctx.graph.edge(unresolved.edge_index);
            outcome.push(
                DrcViolation::new(
                    ViolationDetails::UnresolvedEndpoint {
                        edge_id: edge.id.clone(),
                        missing: unresolved.missing.clone(),
                    },
                    format!("edge {}", edge.id),
                    format!(
                        "Connection '{}' points at a missing {}",
                        edge.id, unresolved.missing
                    ),
                    "Re-run structural validation and apply the auto-fix, or reconnect the edge",
                )
                .with_components(
                    [edge.source.as_str(), edge.target.as_str()]
                        .into_iter()
                        .filter(|id| ctx.diagram().node(id).is_some()),
                )
                .with_connections([edge.id.as_str()]),
            );
        }
        outcome
    }
}

pub struct MissingDirectionRule;

impl Rule for MissingDirectionRule {
    fn id(&self) -> RuleId {
        RuleId::Conn003
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for node in &ctx.diagram().nodes {
            for iface in &node.interfaces {
                outcome.checked();
                if iface.direction.is_some() {
                    continue;
                }
                outcome.push(
                    DrcViolation::new(
                        ViolationDetails::MissingDirection {
                            node_id: node.id.clone(),
                            interface_id: iface.id.clone(),
                        },
                        interface_ref(&node.id, &iface.id),
                        format!(
                            "Interface '{}' on '{}' declares no direction; its role in the bus cannot be checked",
                            iface.name,
                            node.display_name()
                        ),
                        "Set the direction to master, slave, input, output or bidirectional",
                    )
                    .with_components([node.id.as_str()])
                    .with_interfaces([interface_ref(&node.id, &iface.id)]),
                );
            }
        }
        outcome
    }
}

pub struct BusTypeMismatchRule;

impl Rule for BusTypeMismatchRule {
    fn id(&self) -> RuleId {
        RuleId::Conn004
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for conn in ctx.graph.connections() {
            let source = ctx.graph.interface(conn.source);
            let target = ctx.graph.interface(conn.target);
            let (a, b) = (source.bus_type.trim(), target.bus_type.trim());
            if a.is_empty() || b.is_empty() {
                continue;
            }
            outcome.checked();
            if a.eq_ignore_ascii_case(b) {
                continue;
            }
            let edge = ctx.graph.edge(conn.edge_index);
            let violation = DrcViolation::new(
                ViolationDetails::BusTypeMismatch {
                    edge_id: edge.id.clone(),
                    source_bus: a.to_string(),
                    target_bus: b.to_string(),
                },
                ctx.describe(conn),
                format!("Connection '{}' joins a {} interface to a {} interface", edge.id, a, b),
                format!("Insert a {} to {} bridge or use matching bus types", a, b),
            );
            outcome.push(ctx.attach(violation, conn));
        }
        outcome
    }
}

// AXI4 parameters

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WidthKind {
    Data,
    Addr,
    Id,
}

/// Both ends of a connection must agree on one declared bus width
pub struct WidthMatchRule {
    kind: WidthKind,
}

impl WidthMatchRule {
    pub fn data_width() -> Self {
        Self { kind: WidthKind::Data }
    }

    pub fn addr_width() -> Self {
        Self { kind: WidthKind::Addr }
    }

    pub fn id_width() -> Self {
        Self { kind: WidthKind::Id }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            WidthKind::Data => "data width",
            WidthKind::Addr => "address width",
            WidthKind::Id => "ID width",
        }
    }
}

impl Rule for WidthMatchRule {
    fn id(&self) -> RuleId {
        match self.kind {
            WidthKind::Data => RuleId::Axi001,
            WidthKind::Addr => RuleId::Axi002,
            WidthKind::Id => RuleId::Axi003,
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for conn in ctx.graph.connections() {
            let source = ctx.graph.interface(conn.source);
            let target = ctx.graph.interface(conn.target);
            let widths = match self.kind {
                WidthKind::Data => (source.data_width, target.data_width),
                WidthKind::Addr => (source.addr_width, target.addr_width),
                WidthKind::Id => (source.id_width, target.id_width),
            };
            let (Some(sw), Some(tw)) = widths else {
                continue;
            };
            outcome.checked();
            if sw == tw {
                continue;
            }

            let edge = ctx.graph.edge(conn.edge_index);
            let mismatch = WidthMismatch {
                edge_id: edge.id.clone(),
                source_width: sw,
                target_width: tw,
            };
            let details = match self.kind {
                WidthKind::Data => ViolationDetails::DataWidth(mismatch),
                WidthKind::Addr => ViolationDetails::AddrWidth(mismatch),
                WidthKind::Id => ViolationDetails::IdWidth(mismatch),
            };
            let suggestion = match self.kind {
                WidthKind::Id => {
                    "Match the ID widths or let the interconnect remap transaction IDs".to_string()
                }
                _ => format!(
                    "Use matching {}s or insert a width converter between {} and {}",
                    self.label(),
                    sw,
                    tw
                ),
            };
            let violation = DrcViolation::new(
                details,
                ctx.describe(conn),
                format!(
                    "{} mismatch on '{}': {} bits vs {} bits",
                    capitalize(self.label()),
                    edge.id,
                    sw,
                    tw
                ),
                suggestion,
            );
            outcome.push(ctx.attach(violation, conn));
        }
        outcome
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// Performance

pub struct ClockDomainRule;

impl Rule for ClockDomainRule {
    fn id(&self) -> RuleId {
        RuleId::Perf001
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for conn in ctx.graph.connections() {
            let source_node = ctx.graph.node(conn.source.node);
            let target_node = ctx.graph.node(conn.target.node);
            let source = source_node.clock_domain_of(ctx.graph.interface(conn.source));
            let target = target_node.clock_domain_of(ctx.graph.interface(conn.target));
            let (Some(a), Some(b)) = (source, target) else {
                continue;
            };
            outcome.checked();
            if a == b {
                continue;
            }
            let edge = ctx.graph.edge(conn.edge_index);
            let violation = DrcViolation::new(
                ViolationDetails::ClockDomainCrossing {
                    edge_id: edge.id.clone(),
                    source_domain: a.to_string(),
                    target_domain: b.to_string(),
                },
                ctx.describe(conn),
                format!(
                    "Connection '{}' crosses from clock domain '{}' to '{}'",
                    edge.id, a, b
                ),
                "Add a clock-domain-crossing bridge (async FIFO) on this connection",
            );
            outcome.push(ctx.attach(violation, conn));
        }
        outcome
    }
}

pub struct BandwidthRule;

impl Rule for BandwidthRule {
    fn id(&self) -> RuleId {
        RuleId::Perf002
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for (idx, node) in ctx.diagram().nodes.iter().enumerate() {
            let Some(capacity) = node.properties.bandwidth_capacity else {
                continue;
            };
            outcome.checked();

            let inbound = ctx.graph.inbound(idx);
            let mut sources: Vec<usize> = Vec::new();
            for conn in &inbound {
                let from = conn.flow().0.node;
                if from != idx && !sources.contains(&from) {
                    sources.push(from);
                }
            }
            let demand: f64 = sources
                .iter()
                .filter_map(|&s| ctx.graph.node(s).properties.bandwidth)
                .sum();
            if demand <= capacity {
                continue;
            }

            let source_ids: Vec<&str> = sources
                .iter()
                .map(|&s| ctx.graph.node(s).id.as_str())
                .collect();
            outcome.push(
                DrcViolation::new(
                    ViolationDetails::BandwidthOversubscribed {
                        node_id: node.id.clone(),
                        demand,
                        capacity,
                    },
                    format!("node {}", node.id),
                    format!(
                        "'{}' receives {:.1} MB/s of declared demand but can serve {:.1} MB/s",
                        node.display_name(),
                        demand,
                        capacity
                    ),
                    "Raise the capacity, spread the initiators over more ports, or lower their demand",
                )
                .with_components(std::iter::once(node.id.as_str()).chain(source_ids))
                .with_connections(inbound.iter().map(|c| ctx.graph.edge(c.edge_index).id.as_str())),
            );
        }
        outcome
    }
}

// Naming

pub struct NamingConventionRule;

impl Rule for NamingConventionRule {
    fn id(&self) -> RuleId {
        RuleId::Name001
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for node in &ctx.diagram().nodes {
            outcome.checked();
            let name = node.display_name();
            if ctx.naming.is_match(name) {
                continue;
            }
            outcome.push(
                DrcViolation::new(
                    ViolationDetails::NamingConvention {
                        node_id: node.id.clone(),
                        name: name.to_string(),
                        pattern: ctx.options.naming_pattern.clone(),
                    },
                    format!("node {}", node.id),
                    format!(
                        "Name '{}' does not follow the convention {}",
                        name, ctx.options.naming_pattern
                    ),
                    "Rename the block to start with a letter and use letters, digits, '_', '-' or spaces",
                )
                .with_components([node.id.as_str()]),
            );
        }
        outcome
    }
}

pub struct DuplicateNameRule;

impl Rule for DuplicateNameRule {
    fn id(&self) -> RuleId {
        RuleId::Name002
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut order: Vec<&str> = Vec::new();
        for node in &ctx.diagram().nodes {
            outcome.checked();
            let entry = by_name.entry(node.display_name()).or_default();
            if entry.is_empty() {
                order.push(node.display_name());
            }
            entry.push(node.id.as_str());
        }

        for name in order {
            let ids = &by_name[name];
            if ids.len() < 2 {
                continue;
            }
            outcome.push(
                DrcViolation::new(
                    ViolationDetails::DuplicateName {
                        name: name.to_string(),
                        node_ids: ids.iter().map(|s| s.to_string()).collect(),
                    },
                    format!("name {}", name),
                    format!("{} nodes are labelled '{}': {}", ids.len(), name, ids.join(", ")),
                    "Give each block a distinct label so reports and exports stay unambiguous",
                )
                .with_components(ids.iter().copied()),
            );
        }
        outcome
    }
}
