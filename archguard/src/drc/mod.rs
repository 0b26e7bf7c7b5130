//! Design Rule Check (pass 2)
//!
//! The fixed rule catalog, the violation model and the report aggregator.
//! Rules only ever see a diagram that already passed structural validation;
//! they report problems as data and never fail.

pub mod address;
pub mod report;
pub mod rules;
pub mod topology;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use report::{aggregate, aggregate_at, DrcResult, DrcSummary};
pub use rules::{Rule, RuleContext, RuleOutcome, RuleRun, RulesEngine};

/// Severity of a design rule violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the run
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// `true` when `self` is as severe as `threshold` or worse.
    /// Variants are ordered most severe first.
    pub fn is_at_least(self, threshold: Severity) -> bool {
        self <= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// Rule category as shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    Connectivity,
    #[serde(rename = "AXI4 Parameters")]
    Axi4Parameters,
    #[serde(rename = "Address Space")]
    AddressSpace,
    Topology,
    Performance,
    Naming,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleCategory::Connectivity => "Connectivity",
            RuleCategory::Axi4Parameters => "AXI4 Parameters",
            RuleCategory::AddressSpace => "Address Space",
            RuleCategory::Topology => "Topology",
            RuleCategory::Performance => "Performance",
            RuleCategory::Naming => "Naming",
        };
        f.write_str(s)
    }
}

/// Identifier of a catalog rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum RuleId {
    #[serde(rename = "CONN-001")]
    Conn001,
    #[serde(rename = "CONN-002")]
    Conn002,
    #[serde(rename = "CONN-003")]
    Conn003,
    #[serde(rename = "CONN-004")]
    Conn004,
    #[serde(rename = "AXI-001")]
    Axi001,
    #[serde(rename = "AXI-002")]
    Axi002,
    #[serde(rename = "AXI-003")]
    Axi003,
    #[serde(rename = "ADDR-001")]
    Addr001,
    #[serde(rename = "ADDR-002")]
    Addr002,
    #[serde(rename = "ADDR-003")]
    Addr003,
    #[serde(rename = "TOPO-001")]
    Topo001,
    #[serde(rename = "TOPO-002")]
    Topo002,
    #[serde(rename = "PERF-001")]
    Perf001,
    #[serde(rename = "PERF-002")]
    Perf002,
    #[serde(rename = "NAME-001")]
    Name001,
    #[serde(rename = "NAME-002")]
    Name002,
}

impl RuleId {
    pub const ALL: [RuleId; 16] = [
        RuleId::Conn001,
        RuleId::Conn002,
        RuleId::Conn003,
        RuleId::Conn004,
        RuleId::Axi001,
        RuleId::Axi002,
        RuleId::Axi003,
        RuleId::Addr001,
        RuleId::Addr002,
        RuleId::Addr003,
        RuleId::Topo001,
        RuleId::Topo002,
        RuleId::Perf001,
        RuleId::Perf002,
        RuleId::Name001,
        RuleId::Name002,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::Conn001 => "CONN-001",
            RuleId::Conn002 => "CONN-002",
            RuleId::Conn003 => "CONN-003",
            RuleId::Conn004 => "CONN-004",
            RuleId::Axi001 => "AXI-001",
            RuleId::Axi002 => "AXI-002",
            RuleId::Axi003 => "AXI-003",
            RuleId::Addr001 => "ADDR-001",
            RuleId::Addr002 => "ADDR-002",
            RuleId::Addr003 => "ADDR-003",
            RuleId::Topo001 => "TOPO-001",
            RuleId::Topo002 => "TOPO-002",
            RuleId::Perf001 => "PERF-001",
            RuleId::Perf002 => "PERF-002",
            RuleId::Name001 => "NAME-001",
            RuleId::Name002 => "NAME-002",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RuleId::Conn001 => "Unconnected Interface",
            RuleId::Conn002 => "Unresolved Connection",
            RuleId::Conn003 => "Missing Interface Direction",
            RuleId::Conn004 => "Bus Type Mismatch",
            RuleId::Axi001 => "Data Width Mismatch",
            RuleId::Axi002 => "Address Width Mismatch",
            RuleId::Axi003 => "ID Width Mismatch",
            RuleId::Addr001 => "Address Range Overlap",
            RuleId::Addr002 => "Malformed Address",
            RuleId::Addr003 => "Misaligned Base Address",
            RuleId::Topo001 => "Unarbitrated Fan-In",
            RuleId::Topo002 => "Bus Cycle",
            RuleId::Perf001 => "Clock Domain Crossing",
            RuleId::Perf002 => "Bandwidth Oversubscription",
            RuleId::Name001 => "Naming Convention",
            RuleId::Name002 => "Duplicate Display Name",
        }
    }

    pub fn category(self) -> RuleCategory {
        match self {
            RuleId::Conn001 | RuleId::Conn002 | RuleId::Conn003 | RuleId::Conn004 => {
                RuleCategory::Connectivity
            }
            RuleId::Axi001 | RuleId::Axi002 | RuleId::Axi003 => RuleCategory::Axi4Parameters,
            RuleId::Addr001 | RuleId::Addr002 | RuleId::Addr003 => RuleCategory::AddressSpace,
            RuleId::Topo001 | RuleId::Topo002 => RuleCategory::Topology,
            RuleId::Perf001 | RuleId::Perf002 => RuleCategory::Performance,
            RuleId::Name001 | RuleId::Name002 => RuleCategory::Naming,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            RuleId::Axi001 | RuleId::Axi002 | RuleId::Addr001 | RuleId::Topo002 => {
                Severity::Critical
            }
            RuleId::Addr003 | RuleId::Perf002 | RuleId::Name001 => Severity::Info,
            RuleId::Conn001
            | RuleId::Conn002
            | RuleId::Conn003
            | RuleId::Conn004
            | RuleId::Axi003
            | RuleId::Addr002
            | RuleId::Topo001
            | RuleId::Perf001
            | RuleId::Name002 => Severity::Warning,
        }
    }

    /// One-line summary of what the rule checks
    pub fn summary(self) -> &'static str {
        match self {
            RuleId::Conn001 => {
                "Interface has no connection (optional ports only with checkOptionalPorts)"
            }
            RuleId::Conn002 => "Connection endpoint does not resolve to a node interface",
            RuleId::Conn003 => "Interface declares no master/slave/input/output direction",
            RuleId::Conn004 => "Connected interfaces declare different bus types",
            RuleId::Axi001 => "Connected interfaces declare different data widths",
            RuleId::Axi002 => "Connected interfaces declare different address widths",
            RuleId::Axi003 => "Connected interfaces declare different ID widths",
            RuleId::Addr001 => "Memory-mapped address ranges overlap",
            RuleId::Addr002 => "Address is not a 0x-prefixed hex literal",
            RuleId::Addr003 => "Base address is not aligned to the region size",
            RuleId::Topo001 => "Slave interface driven by several masters without an interconnect",
            RuleId::Topo002 => "Master-to-slave connections form a cycle",
            RuleId::Perf001 => "Connection crosses clock domains",
            RuleId::Perf002 => "Inbound bandwidth demand exceeds declared capacity",
            RuleId::Name001 => "Display name does not match the naming convention",
            RuleId::Name002 => "Several nodes share one display name",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RuleId::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown rule id '{}'", s))
    }
}

/// Declared widths on the two ends of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidthMismatch {
    pub edge_id: String,
    pub source_width: u32,
    pub target_width: u32,
}

/// A memory-mapped region as `[base, end)`, both as hex strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRange {
    pub node_id: String,
    pub base: String,
    pub end: String,
}

/// Which address property a malformed value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressField {
    BaseAddress,
    AddressSize,
}

/// Rule-specific payload of a violation, keyed by rule id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ruleId", content = "details")]
pub enum ViolationDetails {
    #[serde(rename = "CONN-001", rename_all = "camelCase")]
    UnconnectedInterface {
        node_id: String,
        interface_id: String,
        optional: bool,
    },
    #[serde(rename = "CONN-002", rename_all = "camelCase")]
    UnresolvedEndpoint { edge_id: String, missing: String },
    #[serde(rename = "CONN-003", rename_all = "camelCase")]
    MissingDirection {
        node_id: String,
        interface_id: String,
    },
    #[serde(rename = "CONN-004", rename_all = "camelCase")]
    BusTypeMismatch {
        edge_id: String,
        source_bus: String,
        target_bus: String,
    },
    #[serde(rename = "AXI-001")]
    DataWidth(WidthMismatch),
    #[serde(rename = "AXI-002")]
    AddrWidth(WidthMismatch),
    #[serde(rename = "AXI-003")]
    IdWidth(WidthMismatch),
    #[serde(rename = "ADDR-001", rename_all = "camelCase")]
    AddressOverlap {
        first: AddressRange,
        second: AddressRange,
        overlap_start: String,
        overlap_end: String,
    },
    #[serde(rename = "ADDR-002", rename_all = "camelCase")]
    MalformedAddress {
        node_id: String,
        field: AddressField,
        value: String,
    },
    #[serde(rename = "ADDR-003", rename_all = "camelCase")]
    MisalignedBase {
        node_id: String,
        base: String,
        size: String,
    },
    #[serde(rename = "TOPO-001", rename_all = "camelCase")]
    UnarbitratedFanIn {
        node_id: String,
        interface_id: String,
        masters: Vec<String>,
    },
    #[serde(rename = "TOPO-002", rename_all = "camelCase")]
    BusCycle { path: Vec<String> },
    #[serde(rename = "PERF-001", rename_all = "camelCase")]
    ClockDomainCrossing {
        edge_id: String,
        source_domain: String,
        target_domain: String,
    },
    #[serde(rename = "PERF-002", rename_all = "camelCase")]
    BandwidthOversubscribed {
        node_id: String,
        demand: f64,
        capacity: f64,
    },
    #[serde(rename = "NAME-001", rename_all = "camelCase")]
    NamingConvention {
        node_id: String,
        name: String,
        pattern: String,
    },
    #[serde(rename = "NAME-002", rename_all = "camelCase")]
    DuplicateName { name: String, node_ids: Vec<String> },
}

impl ViolationDetails {
    pub fn rule_id(&self) -> RuleId {
        match self {
            ViolationDetails::UnconnectedInterface { .. } => RuleId::Conn001,
            ViolationDetails::UnresolvedEndpoint { .. } => RuleId::Conn002,
            ViolationDetails::MissingDirection { .. } => RuleId::Conn003,
            ViolationDetails::BusTypeMismatch { .. } => RuleId::Conn004,
            ViolationDetails::DataWidth(_) => RuleId::Axi001,
            ViolationDetails::AddrWidth(_) => RuleId::Axi002,
            ViolationDetails::IdWidth(_) => RuleId::Axi003,
            ViolationDetails::AddressOverlap { .. } => RuleId::Addr001,
            ViolationDetails::MalformedAddress { .. } => RuleId::Addr002,
            ViolationDetails::MisalignedBase { .. } => RuleId::Addr003,
            ViolationDetails::UnarbitratedFanIn { .. } => RuleId::Topo001,
            ViolationDetails::BusCycle { .. } => RuleId::Topo002,
            ViolationDetails::ClockDomainCrossing { .. } => RuleId::Perf001,
            ViolationDetails::BandwidthOversubscribed { .. } => RuleId::Perf002,
            ViolationDetails::NamingConvention { .. } => RuleId::Name001,
            ViolationDetails::DuplicateName { .. } => RuleId::Name002,
        }
    }
}

/// A single design rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrcViolation {
    pub id: String,
    #[serde(flatten)]
    pub details: ViolationDetails,
    pub rule_name: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub location: String,
    pub description: String,
    pub suggestion: String,
    pub affected_components: Vec<String>,
    pub affected_interfaces: Vec<String>,
    pub affected_connections: Vec<String>,
}

impl DrcViolation {
    /// Build a violation; name, category and severity come from the catalog.
    /// The id is filled in by the engine once the run is complete.
    pub fn new(
        details: ViolationDetails,
        location: impl Into<String>,
        description: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        let rule = details.rule_id();
        Self {
            id: String::new(),
            details,
            rule_name: rule.name().to_string(),
            category: rule.category(),
            severity: rule.severity(),
            location: location.into(),
            description: description.into(),
            suggestion: suggestion.into(),
            affected_components: Vec::new(),
            affected_interfaces: Vec::new(),
            affected_connections: Vec::new(),
        }
    }

    pub fn rule_id(&self) -> RuleId {
        self.details.rule_id()
    }

    pub fn with_components<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.affected_components.contains(&id) {
                self.affected_components.push(id);
            }
        }
        self
    }

    pub fn with_interfaces<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_interfaces.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_connections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_connections.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// `node.interface`, the form interfaces are listed under in reports
pub fn interface_ref(node_id: &str, interface_id: &str) -> String {
    format!("{}.{}", node_id, interface_id)
}
