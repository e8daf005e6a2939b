//! vigil - rule-based health monitoring service with optional LLM analysis
//!
//! Upstream modules submit events over HTTP; a deterministic rule set scores
//! each event, a classifier maps the score to a tri-state health status, and
//! the derived logs back status, query, and on-demand LLM analysis endpoints.

pub mod ai;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod rules;
pub mod server;
pub mod store;

pub use classifier::Thresholds;
pub use engine::MonitorEngine;
pub use error::{AnalysisError, ConfigError, MonitorError};
pub use events::{Event, HealthStatus, LlmAnalysis, MonitoringLog, MonitoringResult};
pub use store::LogStore;
