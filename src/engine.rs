//! Monitor engine tying rule evaluation, history, and classification together

use crate::classifier::{classify, Thresholds};
use crate::error::MonitorError;
use crate::events::{Event, MonitoringResult};
use crate::history::SourceHistory;
use crate::rules::{
    AnomalyRule, ConsistencyRule, HealthRule, InvalidOutputRule, RuleFinding, SilentFailureRule,
    ThresholdRule,
};
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

/// Default number of feature samples retained per source and field
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Build the full rule set with default constants, in evaluation order
pub fn default_rules() -> Vec<Box<dyn HealthRule>> {
    vec![
        Box::new(ThresholdRule::with_defaults()),
        Box::new(InvalidOutputRule::with_defaults()),
        Box::new(ConsistencyRule::with_defaults()),
        Box::new(SilentFailureRule::with_defaults()),
        Box::new(AnomalyRule::with_defaults()),
    ]
}

/// Stateful evaluation engine for submitted events
///
/// Owns the ordered rule list and the per-source histories. Constructed
/// once at startup and shared by handle with every request handler, so
/// tests can run isolated engines side by side.
pub struct MonitorEngine {
    rules: Vec<Box<dyn HealthRule>>,
    thresholds: Thresholds,
    history_capacity: usize,
    /// Per-source rolling histories; the mutex serializes evaluation so a
    /// result is always a pure function of the event and one consistent
    /// history snapshot.
    histories: Mutex<HashMap<String, SourceHistory>>,
}

impl MonitorEngine {
    /// Create an engine with an explicit rule set
    pub fn new(
        rules: Vec<Box<dyn HealthRule>>,
        thresholds: Thresholds,
        history_capacity: usize,
    ) -> Self {
        Self {
            rules,
            thresholds,
            history_capacity,
            histories: Mutex::new(HashMap::new()),
        }
    }

    /// Create an engine with the default rules and constants
    pub fn with_defaults() -> Self {
        Self::new(
            default_rules(),
            Thresholds::default(),
            DEFAULT_HISTORY_CAPACITY,
        )
    }

    /// Number of configured rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Validate and classify one event
    ///
    /// Runs every rule against the current history snapshot for the
    /// event's source, aggregates the findings, then records the event's
    /// numeric features into that source's history. Histories of other
    /// sources are never consulted or touched.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Validation` if required event fields are
    /// missing; rule evaluation itself never fails.
    pub fn evaluate(&self, event: &Event) -> Result<MonitoringResult, MonitorError> {
        event.validate()?;

        let mut histories = self.histories.lock().unwrap();
        let history = histories
            .entry(event.source.clone())
            .or_insert_with(|| SourceHistory::new(self.history_capacity));

        let mut findings: Vec<RuleFinding> = Vec::new();
        for rule in &self.rules {
            findings.extend(rule.evaluate(event, history));
        }

        let result = classify(&findings, self.thresholds);
        debug!(
            "Evaluated event from '{}': status={}, severity={:.2}, rules_fired={}",
            event.source,
            result.status,
            result.severity_score,
            result.failed_rules.len()
        );

        // Update the baseline only after evaluation, so an event never
        // contributes to its own statistics.
        history.record_event(&event.data);

        Ok(result)
    }

    /// Seed a source's history with feature samples (test and replay use)
    pub fn seed_history(&self, source: &str, field: &str, samples: &[f64]) {
        let mut histories = self.histories.lock().unwrap();
        let history = histories
            .entry(source.to_string())
            .or_insert_with(|| SourceHistory::new(self.history_capacity));
        for sample in samples {
            history.record(field, *sample);
        }
    }
}
