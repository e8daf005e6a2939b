//! Rule evaluators and the closed set of rule identifiers

pub mod evaluators;

pub use evaluators::{
    AnomalyRule, ConsistencyRule, InvalidOutputRule, SilentFailureRule, ThresholdRule,
};

use crate::events::Event;
use crate::history::SourceHistory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of rule identifiers
///
/// Every evaluator maps to exactly one variant, keeping the rule set
/// explicit and exhaustively matchable instead of string-keyed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ThresholdViolation,
    InvalidOutput,
    Inconsistency,
    SilentFailure,
    StatisticalAnomaly,
}

impl RuleKind {
    /// Stable identifier used in issue lists and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ThresholdViolation => "threshold_violation",
            RuleKind::InvalidOutput => "invalid_output",
            RuleKind::Inconsistency => "inconsistency",
            RuleKind::SilentFailure => "silent_failure",
            RuleKind::StatisticalAnomaly => "statistical_anomaly",
        }
    }

    /// Fixed remediation text surfaced when this rule fires
    pub fn suggestion(&self) -> &'static str {
        match self {
            RuleKind::ThresholdViolation => {
                "Check downstream service load and recent deployments for the violated metric"
            }
            RuleKind::InvalidOutput => {
                "Inspect the producing module for unhandled errors in its output path"
            }
            RuleKind::Inconsistency => {
                "Cross-check status reporting against the actual payload in the source module"
            }
            RuleKind::SilentFailure => {
                "Verify the operation really completed; success was reported without output"
            }
            RuleKind::StatisticalAnomaly => {
                "Compare the deviating metric against its recent baseline and recent changes"
            }
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One triggered check: which rule fired, how much it contributes to the
/// severity score, and a human-readable issue description
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFinding {
    pub kind: RuleKind,
    pub contribution: f64,
    pub issue: String,
}

/// Trait for health rules evaluated against each submitted event
///
/// Evaluators are pure functions of the event and the current history
/// snapshot for its source. They run independently in a fixed order and
/// never short-circuit each other; an evaluator that cannot compute a
/// meaningful score simply returns no findings.
pub trait HealthRule: Send + Sync {
    /// Evaluate the event, returning one finding per detected issue
    fn evaluate(&self, event: &Event, history: &SourceHistory) -> Vec<RuleFinding>;

    /// Identifier of this rule
    fn kind(&self) -> RuleKind;
}
