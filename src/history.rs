//! Per-source rolling history of numeric event features
//!
//! Each distinct event source gets its own [`SourceHistory`], a map of
//! numeric field name to a fixed-capacity ring buffer of recent values.
//! The anomaly rule computes rolling mean/standard deviation from these
//! windows; histories for different sources never mix.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Maximum number of distinct numeric fields tracked per source
///
/// Payloads are arbitrary key-value maps, so without a cap a source
/// emitting ever-changing field names would allocate a new window per
/// name and grow memory without bound. Fields beyond the cap are ignored;
/// already-tracked fields keep recording.
const MAX_TRACKED_FIELDS: usize = 32;

/// Extract the numeric value of a JSON field, if it has one
pub fn numeric_value(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Fixed-capacity ring buffer of feature samples
///
/// Uses an index-wrapped array with an explicit eviction counter rather
/// than relying on any collection's implicit truncation semantics. When
/// full, a push overwrites the oldest sample.
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    values: Vec<f64>,
    /// Index of the oldest sample
    head: usize,
    capacity: usize,
    /// Total number of samples evicted over the window's lifetime
    evicted: u64,
}

impl FeatureWindow {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be positive");
        Self {
            values: Vec::with_capacity(capacity),
            head: 0,
            capacity,
            evicted: 0,
        }
    }

    /// Append a sample, evicting the oldest if the window is full
    pub fn push(&mut self, value: f64) {
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            self.values[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
            self.evicted += 1;
        }
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no samples have been recorded yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Total number of samples evicted so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Iterate samples in insertion order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let len = self.values.len();
        (0..len).map(move |i| self.values[(self.head + i) % len.max(1)])
    }

    /// Rolling mean of the current samples
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Population standard deviation of the current samples
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.values.len() as f64;
        Some(variance.sqrt())
    }
}

/// Rolling numeric history for one event source
#[derive(Debug, Clone)]
pub struct SourceHistory {
    capacity: usize,
    series: HashMap<String, FeatureWindow>,
}

impl SourceHistory {
    /// Create an empty history whose per-field windows hold `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: HashMap::new(),
        }
    }

    /// Number of samples recorded for a field
    pub fn sample_count(&self, field: &str) -> usize {
        self.series.get(field).map_or(0, FeatureWindow::len)
    }

    /// Rolling mean and standard deviation for a field, if any samples exist
    pub fn stats(&self, field: &str) -> Option<(f64, f64)> {
        let window = self.series.get(field)?;
        Some((window.mean()?, window.std_dev()?))
    }

    /// Number of distinct fields currently tracked
    pub fn tracked_fields(&self) -> usize {
        self.series.len()
    }

    /// Record one sample for a field, lazily creating its window
    ///
    /// New fields are dropped once [`MAX_TRACKED_FIELDS`] windows exist.
    pub fn record(&mut self, field: &str, value: f64) {
        if !self.series.contains_key(field) && self.series.len() >= MAX_TRACKED_FIELDS {
            return;
        }
        self.series
            .entry(field.to_string())
            .or_insert_with(|| FeatureWindow::new(self.capacity))
            .push(value);
    }

    /// Record every numeric field of an event payload
    ///
    /// Called after rule evaluation so the event being evaluated never
    /// contributes to its own baseline.
    pub fn record_event(&mut self, data: &Map<String, Value>) {
        for (field, value) in data {
            if let Some(v) = numeric_value(value) {
                self.record(field, v);
            }
        }
    }
}
