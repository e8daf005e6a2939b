//! Severity aggregation and health classification
//!
//! Combines the findings of all rule evaluators into a single severity
//! score, then maps the score to a tri-state status via two fixed cut
//! points configured once at startup.

use crate::events::{HealthStatus, MonitoringResult};
use crate::rules::{RuleFinding, RuleKind};
use std::collections::BTreeSet;

/// Number of issues cited in the reasoning summary
const REASONING_TOP_ISSUES: usize = 3;

/// Severity cut points, immutable after startup
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Scores at or above this are at least WARNING
    pub warning: f64,
    /// Scores at or above this are CRITICAL
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 0.7,
            critical: 0.9,
        }
    }
}

impl Thresholds {
    /// Map a clamped severity score to a status
    pub fn status_for(&self, severity: f64) -> HealthStatus {
        if severity >= self.critical {
            HealthStatus::Critical
        } else if severity >= self.warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Normal
        }
    }
}

/// Aggregate rule findings into an immutable classification result
///
/// Deterministic: the same findings always produce the same result. The
/// summed severity is clamped to [0.0, 1.0] no matter how many rules fired.
pub fn classify(findings: &[RuleFinding], thresholds: Thresholds) -> MonitoringResult {
    let raw_score: f64 = findings.iter().map(|f| f.contribution).sum();
    let severity_score = raw_score.clamp(0.0, 1.0);
    let status = thresholds.status_for(severity_score);

    let detected_issues: Vec<String> = findings.iter().map(|f| f.issue.clone()).collect();
    let failed_rules: BTreeSet<RuleKind> = findings.iter().map(|f| f.kind).collect();
    let suggestions: Vec<String> = failed_rules
        .iter()
        .map(|kind| kind.suggestion().to_string())
        .collect();

    let reasoning = if detected_issues.is_empty() {
        "All checks passed".to_string()
    } else {
        let top: Vec<&str> = detected_issues
            .iter()
            .take(REASONING_TOP_ISSUES)
            .map(String::as_str)
            .collect();
        format!(
            "{} issue(s) detected (severity {:.2}): {}",
            detected_issues.len(),
            severity_score,
            top.join("; ")
        )
    };

    MonitoringResult {
        status,
        severity_score,
        reasoning,
        detected_issues,
        suggestions,
        failed_rules,
    }
}
