//! Structural validation (pass 1)
//!
//! Graph-level integrity checks that must hold before any design rule can be
//! evaluated, and the reconciler that repairs what the checks find.

pub mod reconciler;
pub mod validator;

use serde::{Deserialize, Serialize};

use crate::diagram::Position;

pub use reconciler::apply_auto_fixes;
pub use validator::validate_diagram;

/// Severity of a structural issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// The diagram cannot be analyzed until this is fixed
    Error,
    /// Reported for awareness; does not block the DRC
    Warning,
}

/// Repair the reconciler applies for an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFix {
    Remove,
    RemoveDuplicate,
    Reverse,
    Rename,
    OffsetPosition,
}

/// How a group of nodes sharing one id gets resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Instances sit at different positions: rename all but the first
    DifferentPosition,
    /// Same position and same label/type/interface count: keep the first
    ExactDuplicate,
    /// Same position, different properties: rename and move apart
    SamePositionDifferentProps,
}

impl DuplicateStrategy {
    pub fn auto_fix(self) -> AutoFix {
        match self {
            DuplicateStrategy::DifferentPosition => AutoFix::Rename,
            DuplicateStrategy::ExactDuplicate => AutoFix::RemoveDuplicate,
            DuplicateStrategy::SamePositionDifferentProps => AutoFix::OffsetPosition,
        }
    }
}

/// Snapshot of one member of a duplicate-id group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateInstance {
    /// Position of the node in `Diagram::nodes`
    pub index: usize,
    pub position: Position,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub interface_count: usize,
}

/// Which part of an edge failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeEndpoint {
    Source,
    Target,
    SourceHandle,
    TargetHandle,
}

/// Issue type together with its type-specific details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details", rename_all = "snake_case")]
pub enum IssueKind {
    #[serde(rename_all = "camelCase")]
    DuplicateNodeId {
        node_id: String,
        strategy: DuplicateStrategy,
        instances: Vec<DuplicateInstance>,
    },
    #[serde(rename_all = "camelCase")]
    DanglingEdge {
        edge_id: String,
        edge_index: usize,
        endpoint: EdgeEndpoint,
        reference: String,
    },
    #[serde(rename_all = "camelCase")]
    SelfLoop {
        edge_id: String,
        edge_index: usize,
        node_id: String,
    },
    #[serde(rename_all = "camelCase")]
    DuplicateEdge {
        edge_id: String,
        edge_index: usize,
        duplicate_of: String,
        reversed: bool,
    },
}

/// A single structural problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(flatten)]
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fix: Option<AutoFix>,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }

    /// Index of the edge this issue is about, if it concerns an edge.
    pub fn edge_index(&self) -> Option<usize> {
        match &self.kind {
            IssueKind::DanglingEdge { edge_index, .. }
            | IssueKind::SelfLoop { edge_index, .. }
            | IssueKind::DuplicateEdge { edge_index, .. } => Some(*edge_index),
            IssueKind::DuplicateNodeId { .. } => None,
        }
    }
}

/// Outcome of a structural validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
