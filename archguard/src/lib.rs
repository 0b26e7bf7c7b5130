//! ArchGuard - validation for SoC architecture diagrams
//!
//! A diagram is a set of hardware blocks (CPUs, memories, interconnects,
//! peripherals) whose bus interfaces are joined by edges. Checking one is a
//! two-pass pipeline:
//!
//! 1. **Structural validation** finds duplicate node ids, dangling edges,
//!    self-loops and duplicate edges, each with an optional auto-fix.
//! 2. **Design rule checks** run a fixed catalog of connectivity, AXI4
//!    parameter, address map, topology, performance and naming rules on a
//!    structurally valid diagram.
//!
//! # Quick Start
//!
//! ```no_run
//! use archguard::{ArchGuardCore, DrcOptions};
//! use std::path::Path;
//!
//! let diagram = ArchGuardCore::load_diagram(Path::new("arch_diagram.json")).unwrap();
//! let report = ArchGuardCore::validate_diagram(&diagram);
//! let diagram = ArchGuardCore::apply_auto_fixes(&diagram, &report);
//!
//! let result = ArchGuardCore::run_check(&diagram, &DrcOptions::default()).unwrap();
//! for violation in &result.violations {
//!     println!("{} [{}] {}", violation.rule_id(), violation.severity, violation.description);
//! }
//! ```

pub mod core;
pub mod diagram;
pub mod drc;
pub mod structural;

// Re-export main types
pub use crate::core::{
    discover_diagrams, ArchGuardCore, ArchGuardError, DrcOptions, PipelineOutcome, ProjectResult,
    DIAGRAM_FILE, RESULTS_FILE,
};
pub use crate::diagram::{Diagram, Direction, Edge, Interface, Node, NodeCategory, Position};
pub use crate::drc::{DrcResult, DrcSummary, DrcViolation, RuleId, RulesEngine, Severity};
pub use crate::structural::{
    apply_auto_fixes, validate_diagram, AutoFix, IssueSeverity, ValidationIssue, ValidationReport,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ArchGuardCore, ArchGuardError, Diagram, DrcOptions, DrcResult, DrcViolation, Edge,
        Interface, Node, NodeCategory, RuleId, Severity, ValidationIssue, ValidationReport,
    };
}
