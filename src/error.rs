use thiserror::Error;

/// Errors raised while validating submitted events
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Invalid event: {0}")]
    Validation(String),
}

/// Errors that can occur during LLM analysis
///
/// The adapter fails closed: every failure mode is surfaced as a distinct
/// variant rather than being downgraded to a fabricated analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("LLM analysis is not enabled")]
    Disabled,

    #[error("No monitoring logs available for analysis")]
    NoLogs,

    #[error("Backend communication failed: {0}")]
    BackendError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
