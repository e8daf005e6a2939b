//! Core event and result types for the monitoring service
//!
//! This module defines the fundamental data structures used throughout the
//! application for representing submitted events, classification results,
//! and persisted monitoring logs.

use crate::error::MonitorError;
use crate::rules::RuleKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Tri-state health classification derived from the severity score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Event looks healthy, no action required
    Normal,
    /// Degraded behavior that may require attention
    Warning,
    /// Serious failure requiring immediate attention
    Critical,
}

impl HealthStatus {
    /// Parse a status string case-insensitively (used for query parameters)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Some(HealthStatus::Normal),
            "warning" => Some(HealthStatus::Warning),
            "critical" => Some(HealthStatus::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Normal => write!(f, "NORMAL"),
            HealthStatus::Warning => write!(f, "WARNING"),
            HealthStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single event report submitted by an upstream module
///
/// Events are ephemeral: they are validated, evaluated against the rule set,
/// and discarded once the derived [`MonitoringLog`] has been stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Identifier of the upstream module that produced this event
    pub source: String,
    /// Kind of event being reported (e.g. "api_response", "query_execution")
    pub event_type: String,
    /// Arbitrary key-value payload describing the event
    pub data: Map<String, Value>,
    /// Optional caller-supplied metadata, not inspected by the rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Optional caller-supplied timestamp; defaults to ingestion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl Event {
    /// Validate required fields before any rule evaluation happens
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.source.trim().is_empty() {
            return Err(MonitorError::Validation(
                "source must not be empty".to_string(),
            ));
        }
        if self.event_type.trim().is_empty() {
            return Err(MonitorError::Validation(
                "event_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Timestamp to record for this event, defaulting to ingestion time
    pub fn effective_timestamp(&self) -> Timestamp {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// Classification result for a single event, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringResult {
    /// Derived health status
    pub status: HealthStatus,
    /// Severity score clamped to [0.0, 1.0]
    pub severity_score: f64,
    /// Short natural-language summary referencing the top issues
    pub reasoning: String,
    /// Ordered list of detected issue descriptions
    pub detected_issues: Vec<String>,
    /// Ordered list of remediation suggestions
    pub suggestions: Vec<String>,
    /// Identifiers of the rules that fired on this event
    pub failed_rules: BTreeSet<RuleKind>,
}

/// Verdict produced by an LLM analysis pass over recent logs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmAnalysis {
    /// When this analysis was produced
    pub timestamp: Timestamp,
    /// Overall system state as judged by the model
    pub system_state: HealthStatus,
    /// Free-form analysis text
    pub analysis: String,
    /// Actionable suggestions extracted from the verdict
    pub suggestions: Vec<String>,
    /// Model-reported confidence in [0.0, 1.0]
    pub confidence: f64,
}

/// Persisted record of one classified event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringLog {
    /// Unique, monotonically increasing identifier assigned by the store
    pub log_id: u64,
    /// When the event was recorded
    pub timestamp: Timestamp,
    /// Source module that submitted the event
    pub source: String,
    /// Event type as submitted
    pub event_type: String,
    /// Size-capped copy of the submitted data payload
    pub input_snapshot: Map<String, Value>,
    /// Embedded classification result
    pub result: MonitoringResult,
    /// Populated only if an LLM analysis pass covered this log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<LlmAnalysis>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected JSON object"),
        }
    }

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Normal).unwrap(),
            "\"NORMAL\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Warning).unwrap(),
            "\"WARNING\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }

    #[test]
    fn test_health_status_ordering() {
        assert!(HealthStatus::Normal < HealthStatus::Warning);
        assert!(HealthStatus::Warning < HealthStatus::Critical);
        assert!(HealthStatus::Normal < HealthStatus::Critical);
    }

    #[test]
    fn test_health_status_parse_case_insensitive() {
        assert_eq!(HealthStatus::parse("warning"), Some(HealthStatus::Warning));
        assert_eq!(HealthStatus::parse("WARNING"), Some(HealthStatus::Warning));
        assert_eq!(HealthStatus::parse("Critical"), Some(HealthStatus::Critical));
        assert_eq!(HealthStatus::parse("bogus"), None);
    }

    #[test]
    fn test_event_validation() {
        let event = Event {
            source: "inference".to_string(),
            event_type: "prediction_result".to_string(),
            data: object(json!({"latency_ms": 200})),
            metadata: None,
            timestamp: None,
        };
        assert!(event.validate().is_ok());

        let missing_source = Event {
            source: "  ".to_string(),
            ..event.clone()
        };
        assert!(missing_source.validate().is_err());

        let missing_type = Event {
            event_type: String::new(),
            ..event
        };
        assert!(missing_type.validate().is_err());
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = Event {
            source: "db".to_string(),
            event_type: "query_execution".to_string(),
            data: object(json!({"status": "success", "rows_affected": null})),
            metadata: Some(object(json!({"test_id": "t1"}))),
            timestamp: Some(Utc::now()),
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_event_deserializes_without_optional_fields() {
        let event: Event = serde_json::from_value(json!({
            "source": "inference",
            "event_type": "prediction_result",
            "data": {"latency_ms": 200}
        }))
        .unwrap();

        assert!(event.metadata.is_none());
        assert!(event.timestamp.is_none());
    }
}
