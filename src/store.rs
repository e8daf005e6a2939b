//! Append-only, size-bounded store of classified monitoring logs
//!
//! Backs the status, logs, and aggregate health queries. Appends evict the
//! oldest entry once the configured capacity is reached; monotonic counters
//! survive eviction so the status endpoint reports lifetime totals.

use crate::events::{HealthStatus, LlmAnalysis, MonitoringLog, MonitoringResult, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Maximum number of top-level fields kept in an input snapshot
const MAX_SNAPSHOT_FIELDS: usize = 50;
/// Maximum length of a string value kept in an input snapshot
const MAX_SNAPSHOT_STRING: usize = 256;
/// Maximum number of distinct issues reported by an aggregate rollup
const MAX_AGGREGATE_ISSUES: usize = 10;
/// Maximum nesting depth kept in an input snapshot
const MAX_SNAPSHOT_DEPTH: usize = 8;

/// Combinable filters for log queries (AND semantics)
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub source: Option<String>,
    pub status: Option<HealthStatus>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

impl LogFilter {
    fn matches(&self, log: &MonitoringLog) -> bool {
        if let Some(source) = &self.source {
            if &log.source != source {
                return false;
            }
        }
        if let Some(status) = self.status {
            if log.result.status != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if log.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if log.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// Result of a filtered query
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Number of stored logs matching the filters, before the limit
    pub total_matched: usize,
    /// Matching logs, most recent first, at most `limit` entries
    pub logs: Vec<MonitoringLog>,
}

/// Best-effort rollup over the most recent log window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateHealth {
    /// Worst status in the window: one CRITICAL log marks the whole
    /// window critical
    pub status: HealthStatus,
    /// Mean severity over the window
    pub avg_severity: f64,
    /// Distinct recent issue descriptions, most recent first
    pub recent_issues: Vec<String>,
}

/// Summary of a critical event for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalEventInfo {
    pub log_id: u64,
    pub timestamp: Timestamp,
    pub source: String,
    pub event_type: String,
}

/// Lifetime counters reported by the status endpoint
///
/// These are monotonic and unaffected by eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_processed: u64,
    pub warning_count: u64,
    pub critical_count: u64,
    pub last_update: Option<Timestamp>,
    pub last_critical_event: Option<CriticalEventInfo>,
}

struct StoreInner {
    logs: VecDeque<MonitoringLog>,
    next_id: u64,
    total_processed: u64,
    warning_count: u64,
    critical_count: u64,
    last_update: Option<Timestamp>,
    last_critical_event: Option<CriticalEventInfo>,
}

/// Shared monitoring log store
///
/// Appends take the write lock briefly; queries and rollups run under the
/// read lock so they can proceed concurrently with each other.
pub struct LogStore {
    max_entries: usize,
    inner: RwLock<StoreInner>,
}

impl LogStore {
    /// Create a store holding at most `max_entries` logs
    pub fn new(max_entries: usize) -> Self {
        assert!(max_entries > 0, "store capacity must be positive");
        Self {
            max_entries,
            inner: RwLock::new(StoreInner {
                logs: VecDeque::with_capacity(max_entries),
                next_id: 1,
                total_processed: 0,
                warning_count: 0,
                critical_count: 0,
                last_update: None,
                last_critical_event: None,
            }),
        }
    }

    /// Append a classified event, evicting the oldest entry at capacity
    ///
    /// Returns the assigned log id. Never fails on capacity.
    pub fn append(
        &self,
        source: &str,
        event_type: &str,
        timestamp: Timestamp,
        data: &Map<String, Value>,
        result: MonitoringResult,
    ) -> u64 {
        let mut inner = self.inner.write().unwrap();
        let log_id = inner.next_id;
        inner.next_id += 1;

        inner.total_processed += 1;
        inner.last_update = Some(timestamp);
        match result.status {
            HealthStatus::Warning => inner.warning_count += 1,
            HealthStatus::Critical => {
                inner.critical_count += 1;
                inner.last_critical_event = Some(CriticalEventInfo {
                    log_id,
                    timestamp,
                    source: source.to_string(),
                    event_type: event_type.to_string(),
                });
            }
            HealthStatus::Normal => {}
        }

        inner.logs.push_back(MonitoringLog {
            log_id,
            timestamp,
            source: source.to_string(),
            event_type: event_type.to_string(),
            input_snapshot: cap_snapshot(data),
            result,
            llm_analysis: None,
        });
        while inner.logs.len() > self.max_entries {
            inner.logs.pop_front();
        }

        log_id
    }

    /// Query logs matching all given filters, most recent first
    ///
    /// Order reflects arrival at the store, not caller-supplied timestamps.
    pub fn query(&self, filter: &LogFilter, limit: usize) -> QueryResult {
        let inner = self.inner.read().unwrap();
        let mut logs = Vec::new();
        let mut total_matched = 0;

        for log in inner.logs.iter().rev() {
            if filter.matches(log) {
                total_matched += 1;
                if logs.len() < limit {
                    logs.push(log.clone());
                }
            }
        }

        QueryResult {
            total_matched,
            logs,
        }
    }

    /// The `n` most recent logs, most recent first
    pub fn recent(&self, n: usize) -> Vec<MonitoringLog> {
        let inner = self.inner.read().unwrap();
        inner.logs.iter().rev().take(n).cloned().collect()
    }

    /// Worst-case-wins health rollup over the last `window_size` logs
    ///
    /// Recomputed from whatever entries remain, so eviction can never
    /// corrupt the result.
    pub fn aggregate_health(&self, window_size: usize) -> AggregateHealth {
        let inner = self.inner.read().unwrap();
        let window: Vec<&MonitoringLog> = inner.logs.iter().rev().take(window_size).collect();

        if window.is_empty() {
            return AggregateHealth {
                status: HealthStatus::Normal,
                avg_severity: 0.0,
                recent_issues: Vec::new(),
            };
        }

        let status = window
            .iter()
            .map(|log| log.result.status)
            .max()
            .unwrap_or(HealthStatus::Normal);
        let avg_severity = window
            .iter()
            .map(|log| log.result.severity_score)
            .sum::<f64>()
            / window.len() as f64;

        let mut recent_issues = Vec::new();
        for log in &window {
            for issue in &log.result.detected_issues {
                if recent_issues.len() >= MAX_AGGREGATE_ISSUES {
                    break;
                }
                if !recent_issues.contains(issue) {
                    recent_issues.push(issue.clone());
                }
            }
        }

        AggregateHealth {
            status,
            avg_severity,
            recent_issues,
        }
    }

    /// Lifetime counters for the status endpoint
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read().unwrap();
        StoreStats {
            total_processed: inner.total_processed,
            warning_count: inner.warning_count,
            critical_count: inner.critical_count,
            last_update: inner.last_update,
            last_critical_event: inner.last_critical_event.clone(),
        }
    }

    /// Attach an LLM analysis to the logs it covered
    ///
    /// Additive only; runs after the adapter has returned, never during
    /// rule evaluation.
    pub fn record_analysis(&self, log_ids: &[u64], analysis: &LlmAnalysis) {
        let mut inner = self.inner.write().unwrap();
        for log in inner.logs.iter_mut() {
            if log_ids.contains(&log.log_id) {
                log.llm_analysis = Some(analysis.clone());
            }
        }
    }

    /// Number of logs currently stored
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().logs.len()
    }

    /// True if no logs are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copy a data payload for persistence, capping it at every level:
/// field and element counts, string lengths, and nesting depth
fn cap_snapshot(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .take(MAX_SNAPSHOT_FIELDS)
        .map(|(key, value)| (key.clone(), cap_value(value, 1)))
        .collect()
}

fn cap_value(value: &Value, depth: usize) -> Value {
    if depth >= MAX_SNAPSHOT_DEPTH {
        return Value::Null;
    }
    match value {
        Value::String(s) if s.len() > MAX_SNAPSHOT_STRING => {
            Value::String(s.chars().take(MAX_SNAPSHOT_STRING).collect())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_SNAPSHOT_FIELDS)
                .map(|v| cap_value(v, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .take(MAX_SNAPSHOT_FIELDS)
                .map(|(k, v)| (k.clone(), cap_value(v, depth + 1)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MonitoringResult;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn result_with(status: HealthStatus, severity: f64) -> MonitoringResult {
        MonitoringResult {
            status,
            severity_score: severity,
            reasoning: "test".to_string(),
            detected_issues: vec![format!("issue at {severity}")],
            suggestions: Vec::new(),
            failed_rules: BTreeSet::new(),
        }
    }

    fn data() -> Map<String, Value> {
        match json!({"latency_ms": 100}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn append_one(store: &LogStore, source: &str, status: HealthStatus, severity: f64) -> u64 {
        store.append(source, "test_event", Utc::now(), &data(), result_with(status, severity))
    }

    #[test]
    fn test_append_assigns_unique_monotonic_ids() {
        let store = LogStore::new(10);
        let a = append_one(&store, "svc", HealthStatus::Normal, 0.0);
        let b = append_one(&store, "svc", HealthStatus::Normal, 0.0);
        assert!(b > a);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let store = LogStore::new(5);
        let first = append_one(&store, "svc", HealthStatus::Normal, 0.0);
        for _ in 0..5 {
            append_one(&store, "svc", HealthStatus::Normal, 0.0);
        }

        assert_eq!(store.len(), 5);
        let all = store.query(&LogFilter::default(), 10);
        assert!(all.logs.iter().all(|log| log.log_id != first));
    }

    #[test]
    fn test_counters_survive_eviction() {
        let store = LogStore::new(2);
        append_one(&store, "svc", HealthStatus::Critical, 1.0);
        append_one(&store, "svc", HealthStatus::Warning, 0.7);
        append_one(&store, "svc", HealthStatus::Normal, 0.0);
        append_one(&store, "svc", HealthStatus::Normal, 0.0);

        let stats = store.stats();
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.warning_count, 1);
        assert_eq!(stats.critical_count, 1);
        assert_eq!(stats.last_critical_event.as_ref().unwrap().log_id, 1);
    }

    #[test]
    fn test_query_filters_combine_with_and_semantics() {
        let store = LogStore::new(20);
        append_one(&store, "api", HealthStatus::Warning, 0.7);
        append_one(&store, "api", HealthStatus::Normal, 0.0);
        append_one(&store, "db", HealthStatus::Warning, 0.8);

        let filter = LogFilter {
            source: Some("api".to_string()),
            status: Some(HealthStatus::Warning),
            ..Default::default()
        };
        let result = store.query(&filter, 10);
        assert_eq!(result.total_matched, 1);
        assert_eq!(result.logs[0].source, "api");
        assert_eq!(result.logs[0].result.status, HealthStatus::Warning);
    }

    #[test]
    fn test_query_time_range_combines_with_source_filter() {
        let store = LogStore::new(20);
        let now = Utc::now();
        let old = now - chrono::Duration::hours(3);
        let mid = now - chrono::Duration::hours(1);

        store.append("api", "test_event", old, &data(), result_with(HealthStatus::Normal, 0.0));
        let mid_id =
            store.append("api", "test_event", mid, &data(), result_with(HealthStatus::Normal, 0.0));
        store.append("db", "test_event", mid, &data(), result_with(HealthStatus::Normal, 0.0));
        store.append("api", "test_event", now, &data(), result_with(HealthStatus::Normal, 0.0));

        // since/until bracket the middle log; the db log is excluded by source
        let filter = LogFilter {
            source: Some("api".to_string()),
            since: Some(now - chrono::Duration::hours(2)),
            until: Some(now - chrono::Duration::minutes(30)),
            ..Default::default()
        };
        let result = store.query(&filter, 10);
        assert_eq!(result.total_matched, 1);
        assert_eq!(result.logs[0].log_id, mid_id);

        // Bounds are inclusive
        let exact = LogFilter {
            since: Some(mid),
            until: Some(mid),
            ..Default::default()
        };
        assert_eq!(store.query(&exact, 10).total_matched, 2);
    }

    #[test]
    fn test_query_most_recent_first_and_limited() {
        let store = LogStore::new(20);
        for i in 0..8 {
            append_one(&store, "svc", HealthStatus::Warning, 0.7 + i as f64 * 0.01);
        }

        let filter = LogFilter {
            status: Some(HealthStatus::Warning),
            ..Default::default()
        };
        let result = store.query(&filter, 5);
        assert_eq!(result.total_matched, 8);
        assert_eq!(result.logs.len(), 5);
        // Arrival order, newest first
        let ids: Vec<u64> = result.logs.iter().map(|log| log.log_id).collect();
        assert_eq!(ids, vec![8, 7, 6, 5, 4]);
    }

    #[test]
    fn test_aggregate_health_worst_case_wins() {
        let store = LogStore::new(20);
        for _ in 0..9 {
            append_one(&store, "svc", HealthStatus::Normal, 0.0);
        }
        append_one(&store, "svc", HealthStatus::Critical, 1.0);

        let health = store.aggregate_health(10);
        assert_eq!(health.status, HealthStatus::Critical);
        assert!(health.avg_severity > 0.0);
    }

    #[test]
    fn test_aggregate_health_empty_store() {
        let store = LogStore::new(5);
        let health = store.aggregate_health(10);
        assert_eq!(health.status, HealthStatus::Normal);
        assert_eq!(health.avg_severity, 0.0);
        assert!(health.recent_issues.is_empty());
    }

    #[test]
    fn test_aggregate_health_window_excludes_older_logs() {
        let store = LogStore::new(20);
        append_one(&store, "svc", HealthStatus::Critical, 1.0);
        for _ in 0..5 {
            append_one(&store, "svc", HealthStatus::Normal, 0.0);
        }

        // The critical log has fallen outside the 5-entry window
        let health = store.aggregate_health(5);
        assert_eq!(health.status, HealthStatus::Normal);
    }

    #[test]
    fn test_record_analysis_marks_covered_logs() {
        let store = LogStore::new(10);
        let a = append_one(&store, "svc", HealthStatus::Warning, 0.7);
        let b = append_one(&store, "svc", HealthStatus::Normal, 0.0);

        let analysis = LlmAnalysis {
            timestamp: Utc::now(),
            system_state: HealthStatus::Warning,
            analysis: "degrading".to_string(),
            suggestions: vec!["scale up".to_string()],
            confidence: 0.8,
        };
        store.record_analysis(&[a], &analysis);

        let logs = store.query(&LogFilter::default(), 10).logs;
        let covered = logs.iter().find(|log| log.log_id == a).unwrap();
        let uncovered = logs.iter().find(|log| log.log_id == b).unwrap();
        assert!(covered.llm_analysis.is_some());
        assert!(uncovered.llm_analysis.is_none());
    }

    #[test]
    fn test_snapshot_caps_long_strings() {
        let store = LogStore::new(5);
        let long = "x".repeat(10_000);
        let data = match json!({"blob": long}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        store.append(
            "svc",
            "test_event",
            Utc::now(),
            &data,
            result_with(HealthStatus::Normal, 0.0),
        );

        let logs = store.recent(1);
        let stored = logs[0].input_snapshot.get("blob").unwrap().as_str().unwrap();
        assert_eq!(stored.len(), 256);
    }

    #[test]
    fn test_snapshot_caps_nested_collections() {
        let store = LogStore::new(5);
        let items: Vec<i64> = (0..500).collect();
        let data = match json!({
            "payload": {
                "items": items,
                "note": "y".repeat(5_000)
            }
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        store.append(
            "svc",
            "test_event",
            Utc::now(),
            &data,
            result_with(HealthStatus::Normal, 0.0),
        );

        let logs = store.recent(1);
        let payload = logs[0].input_snapshot.get("payload").unwrap();
        assert_eq!(payload["items"].as_array().unwrap().len(), 50);
        assert_eq!(payload["note"].as_str().unwrap().len(), 256);
    }

    #[test]
    fn test_snapshot_caps_nesting_depth() {
        let store = LogStore::new(5);
        let mut value = json!(1);
        for _ in 0..20 {
            value = json!({"inner": value});
        }
        let data = match json!({"deep": value}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        store.append(
            "svc",
            "test_event",
            Utc::now(),
            &data,
            result_with(HealthStatus::Normal, 0.0),
        );

        let logs = store.recent(1);
        let mut cursor = logs[0].input_snapshot.get("deep").unwrap();
        let mut depth = 1;
        while let Some(inner) = cursor.get("inner") {
            cursor = inner;
            depth += 1;
        }
        assert!(cursor.is_null());
        assert!(depth < 20);
    }
}
