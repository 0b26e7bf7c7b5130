use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DrcViolation, Severity};

/// Violation counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrcSummary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl DrcSummary {
    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }
}

/// Outcome of one DRC run, as persisted in `drc_results.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrcResult {
    pub total_checks: usize,
    pub violations: Vec<DrcViolation>,
    pub summary: DrcSummary,
    pub passed: bool,
    pub timestamp: DateTime<Utc>,
}

impl DrcResult {
    /// Violations at or above `threshold`
    pub fn at_least(&self, threshold: Severity) -> impl Iterator<Item = &DrcViolation> {
        self.violations.iter().filter(move |v| v.severity.is_at_least(threshold))
    }
}

/// Summarize a run, stamped with the current time.
pub fn aggregate(violations: Vec<DrcViolation>, total_checks: usize) -> DrcResult {
    aggregate_at(violations, total_checks, Utc::now())
}

/// Summarize a run with an explicit timestamp.
///
/// Violation order is preserved. The run passes when nothing critical was
/// found; warnings and info findings never fail it.
pub fn aggregate_at(
    violations: Vec<DrcViolation>,
    total_checks: usize,
    timestamp: DateTime<Utc>,
) -> DrcResult {
    let mut summary = DrcSummary::default();
    for violation in &violations {
        match violation.severity {
            Severity::Critical => summary.critical += 1,
            Severity::Warning => summary.warning += 1,
            Severity::Info => summary.info += 1,
        }
    }

    DrcResult {
        total_checks,
        violations,
        passed: summary.critical == 0,
        summary,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drc::ViolationDetails;
    use chrono::TimeZone;

    fn violation(details: ViolationDetails) -> DrcViolation {
        DrcViolation::new(details, "here", "what", "fix")
    }

    fn naming() -> DrcViolation {
        violation(ViolationDetails::NamingConvention {
            node_id: "n".into(),
            name: "1bad".into(),
            pattern: "^x$".into(),
        })
    }

    fn cycle() -> DrcViolation {
        violation(ViolationDetails::BusCycle {
            path: vec!["a".into(), "b".into()],
        })
    }

    #[test]
    fn test_empty_run_passes() {
        let result = aggregate(Vec::new(), 0);
        assert!(result.passed);
        assert_eq!(result.summary, DrcSummary::default());
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let result = aggregate(vec![naming(), naming()], 4);
        assert!(result.passed);
        assert_eq!(result.summary.warning + result.summary.info, 2);
        assert_eq!(result.summary.total(), 2);
    }

    #[test]
    fn test_critical_fails_and_order_is_kept() {
        let result = aggregate(vec![naming(), cycle()], 2);
        assert!(!result.passed);
        assert_eq!(result.summary.critical, 1);
        assert_eq!(result.violations[1].rule_id(), crate::drc::RuleId::Topo002);
        assert_eq!(result.summary.count(Severity::Critical), 1);
        assert_eq!(result.summary.count(Severity::Info), 1);
        assert_eq!(result.summary.count(Severity::Warning), 0);
    }

    #[test]
    fn test_serialized_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let result = aggregate_at(vec![cycle()], 1, ts);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalChecks"], 1);
        assert_eq!(json["passed"], false);
        assert_eq!(json["summary"]["critical"], 1);
        assert_eq!(json["violations"][0]["ruleId"], "TOPO-002");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");

        let back: DrcResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
