//! Built-in health rule implementations
//!
//! Each rule inspects one failure pattern in the submitted payload:
//! numeric ceilings, null or sentinel outputs, contradictory fields,
//! success claims without output, and statistical deviation from the
//! source's rolling baseline.

use crate::events::Event;
use crate::history::{numeric_value, SourceHistory};
use crate::rules::{HealthRule, RuleFinding, RuleKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fields treated as the output of an operation
const OUTPUT_FIELDS: &[&str] = &[
    "output",
    "result",
    "response",
    "payload",
    "prediction",
    "rows_affected",
];

/// Fields carrying an item/record count
const COUNT_FIELDS: &[&str] = &[
    "items_processed",
    "items_returned",
    "records_processed",
    "rows_affected",
    "count",
];

/// String values that signal an error regardless of the reported status
const ERROR_SENTINELS: &[&str] = &["error", "failed", "null", "undefined", "nan"];

/// True if the payload claims the operation succeeded
fn reports_success(data: &Map<String, Value>) -> bool {
    if let Some(status) = data.get("status").and_then(Value::as_str) {
        if matches!(
            status.to_ascii_lowercase().as_str(),
            "success" | "ok" | "completed"
        ) {
            return true;
        }
    }
    if let Some(code) = data.get("status_code").and_then(Value::as_i64) {
        if (200..300).contains(&code) {
            return true;
        }
    }
    data.get("processed").and_then(Value::as_bool) == Some(true)
        || data.get("completed").and_then(Value::as_bool) == Some(true)
}

/// True if an output value carries no substantive content
fn is_empty_output(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Rule that compares named numeric fields against fixed per-field ceilings
///
/// Each violated field contributes the base increment scaled by how far
/// the value overshoots its ceiling, capped at 1.0 per field, so a gross
/// violation can escalate to CRITICAL on its own while marginal ones only
/// nudge the score.
pub struct ThresholdRule {
    /// Per-field ceilings, keyed by data field name
    ceilings: BTreeMap<String, f64>,
    /// Base severity increment per violated field
    pub increment: f64,
}

impl ThresholdRule {
    /// Create a threshold rule with custom ceilings
    pub fn new(ceilings: BTreeMap<String, f64>, increment: f64) -> Self {
        Self {
            ceilings,
            increment,
        }
    }

    /// Create a threshold rule with the default metric ceilings
    pub fn with_defaults() -> Self {
        Self::new(Self::default_ceilings(), 0.25)
    }

    /// Default ceilings for commonly reported metrics
    pub fn default_ceilings() -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("latency_ms".to_string(), 1000.0),
            ("response_time".to_string(), 5000.0),
            ("error_rate".to_string(), 0.05),
            ("cpu_usage".to_string(), 90.0),
            ("memory_usage".to_string(), 90.0),
            ("disk_usage".to_string(), 95.0),
        ])
    }
}

impl HealthRule for ThresholdRule {
    fn evaluate(&self, event: &Event, _history: &SourceHistory) -> Vec<RuleFinding> {
        let mut findings = Vec::new();

        for (field, ceiling) in &self.ceilings {
            let Some(value) = event.data.get(field).and_then(numeric_value) else {
                continue;
            };
            if value > *ceiling {
                let overshoot = value / ceiling;
                findings.push(RuleFinding {
                    kind: RuleKind::ThresholdViolation,
                    contribution: (self.increment * overshoot).min(1.0),
                    issue: format!("{field} = {value} exceeds ceiling {ceiling}"),
                });
            }
        }

        findings
    }

    fn kind(&self) -> RuleKind {
        RuleKind::ThresholdViolation
    }
}

/// Rule that flags null output fields or error sentinel strings
pub struct InvalidOutputRule {
    pub increment: f64,
}

impl InvalidOutputRule {
    pub fn new(increment: f64) -> Self {
        Self { increment }
    }

    pub fn with_defaults() -> Self {
        Self::new(0.3)
    }
}

impl HealthRule for InvalidOutputRule {
    fn evaluate(&self, event: &Event, _history: &SourceHistory) -> Vec<RuleFinding> {
        let mut findings = Vec::new();

        for field in OUTPUT_FIELDS {
            let Some(value) = event.data.get(*field) else {
                continue;
            };
            if value.is_null() {
                findings.push(RuleFinding {
                    kind: RuleKind::InvalidOutput,
                    contribution: self.increment,
                    issue: format!("output field '{field}' is null"),
                });
            } else if let Some(s) = value.as_str() {
                if ERROR_SENTINELS.contains(&s.trim().to_ascii_lowercase().as_str()) {
                    findings.push(RuleFinding {
                        kind: RuleKind::InvalidOutput,
                        contribution: self.increment,
                        issue: format!("output field '{field}' carries error value '{s}'"),
                    });
                }
            }
        }

        findings
    }

    fn kind(&self) -> RuleKind {
        RuleKind::InvalidOutput
    }
}

/// Rule that cross-validates logically coupled fields
///
/// Detects a success status paired with an error payload, a server-error
/// status code paired with a success claim, and a claimed
/// processed/completed flag alongside a zero item count.
pub struct ConsistencyRule {
    pub increment: f64,
}

impl ConsistencyRule {
    pub fn new(increment: f64) -> Self {
        Self { increment }
    }

    pub fn with_defaults() -> Self {
        Self::new(0.2)
    }
}

impl HealthRule for ConsistencyRule {
    fn evaluate(&self, event: &Event, _history: &SourceHistory) -> Vec<RuleFinding> {
        let mut findings = Vec::new();
        let data = &event.data;

        if reports_success(data) {
            for error_field in ["error", "error_message", "errors"] {
                if let Some(value) = data.get(error_field) {
                    if !is_empty_output(value) {
                        findings.push(RuleFinding {
                            kind: RuleKind::Inconsistency,
                            contribution: self.increment,
                            issue: format!(
                                "success reported alongside non-empty '{error_field}' field"
                            ),
                        });
                    }
                }
            }
        }

        // Reverse direction: a server-error status code paired with a
        // payload that still claims success
        let server_error_code = data
            .get("status_code")
            .and_then(Value::as_i64)
            .is_some_and(|code| (500..600).contains(&code));
        if server_error_code && reports_success(data) {
            findings.push(RuleFinding {
                kind: RuleKind::Inconsistency,
                contribution: self.increment,
                issue: "server error status code alongside a success report".to_string(),
            });
        }

        let claims_processing = data.get("processed").and_then(Value::as_bool) == Some(true)
            || data.get("completed").and_then(Value::as_bool) == Some(true);
        if claims_processing {
            for count_field in COUNT_FIELDS {
                if data.get(*count_field).and_then(numeric_value) == Some(0.0) {
                    findings.push(RuleFinding {
                        kind: RuleKind::Inconsistency,
                        contribution: self.increment,
                        issue: format!("processing claimed but '{count_field}' is zero"),
                    });
                }
            }
        }

        findings
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Inconsistency
    }
}

/// Rule that flags success reports carrying no substantive output
///
/// Silent failures carry the largest increment because they are the
/// hardest to detect downstream. Fires at most once per event.
pub struct SilentFailureRule {
    pub increment: f64,
}

impl SilentFailureRule {
    pub fn new(increment: f64) -> Self {
        Self { increment }
    }

    pub fn with_defaults() -> Self {
        Self::new(0.4)
    }
}

impl HealthRule for SilentFailureRule {
    fn evaluate(&self, event: &Event, _history: &SourceHistory) -> Vec<RuleFinding> {
        let data = &event.data;
        if !reports_success(data) {
            return Vec::new();
        }

        let present_outputs: Vec<(&str, &Value)> = OUTPUT_FIELDS
            .iter()
            .filter_map(|field| data.get(*field).map(|v| (*field, v)))
            .collect();

        let all_outputs_empty =
            !present_outputs.is_empty() && present_outputs.iter().all(|(_, v)| is_empty_output(v));

        let has_substantive_output = present_outputs.iter().any(|(_, v)| !is_empty_output(v));
        let zero_item_count = COUNT_FIELDS
            .iter()
            .any(|field| data.get(*field).and_then(numeric_value) == Some(0.0));

        if all_outputs_empty || (zero_item_count && !has_substantive_output) {
            return vec![RuleFinding {
                kind: RuleKind::SilentFailure,
                contribution: self.increment,
                issue: "success reported with no substantive output".to_string(),
            }];
        }

        Vec::new()
    }

    fn kind(&self) -> RuleKind {
        RuleKind::SilentFailure
    }
}

/// Rule that scores numeric fields against the source's rolling baseline
///
/// Skips fields with fewer than `min_samples` recorded values rather than
/// guessing from insufficient data. A zero standard deviation means the
/// baseline is constant, so any deviation at all is anomalous.
pub struct AnomalyRule {
    /// Minimum history samples required before a field is scored
    pub min_samples: usize,
    /// Absolute z-score above which a value is anomalous
    pub z_threshold: f64,
    /// Severity increment per anomalous field
    pub increment: f64,
}

impl AnomalyRule {
    pub fn new(min_samples: usize, z_threshold: f64, increment: f64) -> Self {
        Self {
            min_samples,
            z_threshold,
            increment,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(5, 3.0, 0.1)
    }
}

impl HealthRule for AnomalyRule {
    fn evaluate(&self, event: &Event, history: &SourceHistory) -> Vec<RuleFinding> {
        let mut findings = Vec::new();

        for (field, value) in &event.data {
            let Some(value) = numeric_value(value) else {
                continue;
            };
            if history.sample_count(field) < self.min_samples {
                continue;
            }
            let Some((mean, std_dev)) = history.stats(field) else {
                continue;
            };

            let issue = if std_dev == 0.0 {
                if value == mean {
                    continue;
                }
                format!("{field} = {value} deviates from constant baseline {mean:.2}")
            } else {
                let z = (value - mean) / std_dev;
                if z.abs() <= self.z_threshold {
                    continue;
                }
                format!("{field} = {value} deviates from rolling mean {mean:.2} (z = {z:.2})")
            };

            findings.push(RuleFinding {
                kind: RuleKind::StatisticalAnomaly,
                contribution: self.increment,
                issue,
            });
        }

        findings
    }

    fn kind(&self) -> RuleKind {
        RuleKind::StatisticalAnomaly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with_data(data: serde_json::Value) -> Event {
        let data = match data {
            Value::Object(map) => map,
            _ => panic!("expected JSON object"),
        };
        Event {
            source: "test".to_string(),
            event_type: "test_event".to_string(),
            data,
            metadata: None,
            timestamp: None,
        }
    }

    fn empty_history() -> SourceHistory {
        SourceHistory::new(100)
    }

    #[test]
    fn test_threshold_rule_no_trigger_below_ceiling() {
        let rule = ThresholdRule::with_defaults();
        let event = event_with_data(json!({"latency_ms": 200, "cpu_usage": 40}));

        assert!(rule.evaluate(&event, &empty_history()).is_empty());
    }

    #[test]
    fn test_threshold_rule_scales_with_overshoot() {
        let rule = ThresholdRule::with_defaults();
        let event = event_with_data(json!({"latency_ms": 2000}));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, RuleKind::ThresholdViolation);
        // 0.25 increment scaled by 2000/1000 overshoot
        assert!((findings[0].contribution - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_rule_gross_violation_caps_at_one() {
        let rule = ThresholdRule::with_defaults();
        let event = event_with_data(json!({"latency_ms": 60000}));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].contribution, 1.0);
    }

    #[test]
    fn test_threshold_rule_multiple_violations_accumulate() {
        let rule = ThresholdRule::with_defaults();
        let event = event_with_data(json!({
            "latency_ms": 1500,
            "cpu_usage": 95,
            "error_rate": 0.2
        }));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 3);
    }

    #[test]
    fn test_invalid_output_rule_null_field() {
        let rule = InvalidOutputRule::with_defaults();
        let event = event_with_data(json!({"result": null}));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].contribution, 0.3);
        assert!(findings[0].issue.contains("result"));
    }

    #[test]
    fn test_invalid_output_rule_error_sentinel() {
        let rule = InvalidOutputRule::with_defaults();
        let event = event_with_data(json!({"output": "ERROR"}));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_invalid_output_rule_ignores_valid_output() {
        let rule = InvalidOutputRule::with_defaults();
        let event = event_with_data(json!({"output": "all good", "result": 42}));

        assert!(rule.evaluate(&event, &empty_history()).is_empty());
    }

    #[test]
    fn test_consistency_rule_success_with_error_payload() {
        let rule = ConsistencyRule::with_defaults();
        let event = event_with_data(json!({
            "status": "success",
            "error": "connection refused"
        }));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, RuleKind::Inconsistency);
    }

    #[test]
    fn test_consistency_rule_error_code_with_success_claim() {
        let rule = ConsistencyRule::with_defaults();
        let event = event_with_data(json!({
            "status": "success",
            "status_code": 503
        }));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, RuleKind::Inconsistency);
        assert!(findings[0].issue.contains("server error"));
    }

    #[test]
    fn test_consistency_rule_error_code_without_success_claim_is_clean() {
        let rule = ConsistencyRule::with_defaults();
        let event = event_with_data(json!({
            "status": "failed",
            "status_code": 500
        }));

        assert!(rule.evaluate(&event, &empty_history()).is_empty());
    }

    #[test]
    fn test_consistency_rule_processed_with_zero_count() {
        let rule = ConsistencyRule::with_defaults();
        let event = event_with_data(json!({
            "processed": true,
            "items_processed": 0
        }));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].issue.contains("items_processed"));
    }

    #[test]
    fn test_consistency_rule_no_trigger_on_clean_success() {
        let rule = ConsistencyRule::with_defaults();
        let event = event_with_data(json!({
            "status": "success",
            "processed": true,
            "items_processed": 12
        }));

        assert!(rule.evaluate(&event, &empty_history()).is_empty());
    }

    #[test]
    fn test_silent_failure_rule_null_output() {
        let rule = SilentFailureRule::with_defaults();
        let event = event_with_data(json!({
            "status": "success",
            "rows_affected": null
        }));

        let findings = rule.evaluate(&event, &empty_history());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].contribution, 0.4);
    }

    #[test]
    fn test_silent_failure_rule_zero_items_without_output() {
        let rule = SilentFailureRule::with_defaults();
        let event = event_with_data(json!({
            "status": "completed",
            "items_processed": 0
        }));

        assert_eq!(rule.evaluate(&event, &empty_history()).len(), 1);
    }

    #[test]
    fn test_silent_failure_rule_no_trigger_with_real_output() {
        let rule = SilentFailureRule::with_defaults();
        let event = event_with_data(json!({
            "status": "success",
            "result": {"rows": [1, 2, 3]}
        }));

        assert!(rule.evaluate(&event, &empty_history()).is_empty());
    }

    #[test]
    fn test_silent_failure_rule_no_trigger_without_success_claim() {
        let rule = SilentFailureRule::with_defaults();
        let event = event_with_data(json!({
            "status": "failed",
            "result": null
        }));

        assert!(rule.evaluate(&event, &empty_history()).is_empty());
    }

    #[test]
    fn test_anomaly_rule_skips_insufficient_history() {
        let rule = AnomalyRule::with_defaults();
        let mut history = empty_history();
        for _ in 0..4 {
            history.record("latency_ms", 200.0);
        }

        // Extreme outlier, but only 4 samples: insufficient data, not normal
        let event = event_with_data(json!({"latency_ms": 100000}));
        assert!(rule.evaluate(&event, &history).is_empty());
    }

    #[test]
    fn test_anomaly_rule_constant_baseline_deviation() {
        let rule = AnomalyRule::with_defaults();
        let mut history = empty_history();
        for _ in 0..5 {
            history.record("latency_ms", 200.0);
        }

        let event = event_with_data(json!({"latency_ms": 6000}));
        let findings = rule.evaluate(&event, &history);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, RuleKind::StatisticalAnomaly);
    }

    #[test]
    fn test_anomaly_rule_z_score_threshold() {
        let rule = AnomalyRule::new(5, 3.0, 0.1);
        let mut history = empty_history();
        for v in [100.0, 110.0, 90.0, 105.0, 95.0, 100.0] {
            history.record("latency_ms", v);
        }

        // Close to the mean: no trigger
        let event = event_with_data(json!({"latency_ms": 108}));
        assert!(rule.evaluate(&event, &history).is_empty());

        // Far outside three standard deviations: trigger
        let event = event_with_data(json!({"latency_ms": 500}));
        assert_eq!(rule.evaluate(&event, &history).len(), 1);
    }

    #[test]
    fn test_anomaly_rule_matching_constant_value_is_normal() {
        let rule = AnomalyRule::with_defaults();
        let mut history = empty_history();
        for _ in 0..10 {
            history.record("latency_ms", 200.0);
        }

        let event = event_with_data(json!({"latency_ms": 200}));
        assert!(rule.evaluate(&event, &history).is_empty());
    }

    #[test]
    fn test_reports_success_variants() {
        for data in [
            json!({"status": "success"}),
            json!({"status": "OK"}),
            json!({"status_code": 204}),
            json!({"processed": true}),
            json!({"completed": true}),
        ] {
            let event = event_with_data(data);
            assert!(reports_success(&event.data));
        }

        for data in [
            json!({"status": "error"}),
            json!({"status_code": 500}),
            json!({"processed": false}),
        ] {
            let event = event_with_data(data);
            assert!(!reports_success(&event.data));
        }
    }
}
