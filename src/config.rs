//! Process-wide configuration, read once at startup
//!
//! Loaded from a TOML file with serde defaults for every field; a missing
//! file falls back to defaults with a warning. All values are immutable
//! after startup.

use crate::classifier::Thresholds;
use crate::error::ConfigError;
use log::warn;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Rule evaluation and storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Severity at or above which an event is WARNING
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    /// Severity at or above which an event is CRITICAL
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
    /// Maximum number of monitoring logs retained
    #[serde(default = "default_max_logs")]
    pub max_logs: usize,
    /// Feature samples retained per source and field
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Minimum samples before the anomaly rule scores a field
    #[serde(default = "default_min_anomaly_samples")]
    pub min_anomaly_samples: usize,
    /// Absolute z-score above which a value is anomalous
    #[serde(default = "default_z_score_threshold")]
    pub z_score_threshold: f64,
    /// Upper bound for the logs endpoint `limit` parameter
    #[serde(default = "default_max_query_limit")]
    pub max_query_limit: usize,
    /// Window size for the aggregate status rollup
    #[serde(default = "default_status_window")]
    pub status_window: usize,
    /// Optional per-field ceiling overrides for the threshold rule
    #[serde(default)]
    pub ceilings: BTreeMap<String, f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            max_logs: default_max_logs(),
            history_capacity: default_history_capacity(),
            min_anomaly_samples: default_min_anomaly_samples(),
            z_score_threshold: default_z_score_threshold(),
            max_query_limit: default_max_query_limit(),
            status_window: default_status_window(),
            ceilings: BTreeMap::new(),
        }
    }
}

impl MonitorConfig {
    /// Classifier cut points from this configuration
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            warning: self.warning_threshold,
            critical: self.critical_threshold,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

/// LLM analysis adapter settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Master switch for the analysis pass
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    /// Provider API key (required when enabled with the openai provider)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Endpoint for the ollama provider
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Default number of recent logs per analysis request
    #[serde(default = "default_sample_size")]
    pub default_sample_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            api_key: String::new(),
            model: default_model(),
            endpoint: default_endpoint(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
            default_sample_size: default_sample_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_warning_threshold() -> f64 {
    0.7
}
fn default_critical_threshold() -> f64 {
    0.9
}
fn default_max_logs() -> usize {
    1000
}
fn default_history_capacity() -> usize {
    100
}
fn default_min_anomaly_samples() -> usize {
    5
}
fn default_z_score_threshold() -> f64 {
    3.0
}
fn default_max_query_limit() -> usize {
    500
}
fn default_status_window() -> usize {
    10
}
fn default_provider() -> LlmProvider {
    LlmProvider::OpenAi
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_timeout_seconds() -> u64 {
    60
}
fn default_sample_size() -> usize {
    10
}

impl Config {
    /// Load configuration from an optional TOML file
    ///
    /// A missing file is not an error: the service starts with defaults
    /// and logs a warning.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::ReadError(format!("{}: {e}", path.display()))
                })?;
                toml::from_str(&contents)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Config::default()
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;
        if !(0.0..=1.0).contains(&monitor.warning_threshold)
            || !(0.0..=1.0).contains(&monitor.critical_threshold)
        {
            return Err(ConfigError::ValidationError(
                "thresholds must lie in [0.0, 1.0]".to_string(),
            ));
        }
        if monitor.warning_threshold >= monitor.critical_threshold {
            return Err(ConfigError::ValidationError(format!(
                "warning_threshold ({}) must be below critical_threshold ({})",
                monitor.warning_threshold, monitor.critical_threshold
            )));
        }
        if monitor.max_logs == 0 || monitor.history_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "max_logs and history_capacity must be positive".to_string(),
            ));
        }
        if self.llm.enabled
            && self.llm.provider == LlmProvider::OpenAi
            && self.llm.api_key.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "llm.enabled is true but llm.api_key is not set".to_string(),
            ));
        }
        Ok(())
    }
}
