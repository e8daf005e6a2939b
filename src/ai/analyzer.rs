//! On-demand LLM analysis over recent monitoring logs
//!
//! The analyzer samples recent logs, serializes them into a structured
//! prompt, and parses the provider's reply into a typed verdict. Every
//! failure mode surfaces as a distinct [`AnalysisError`]; callers never
//! receive a fabricated analysis.

use crate::ai::backends::LlmBackend;
use crate::error::AnalysisError;
use crate::events::{HealthStatus, LlmAnalysis, MonitoringLog};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Capability trait for the optional analysis pass
///
/// Selected once at startup: either a real network-backed analyzer or the
/// disabled implementation, so core request handling carries no
/// enabled-checks of its own.
pub trait Analyzer: Send + Sync {
    /// Whether this analyzer can actually produce verdicts
    fn is_enabled(&self) -> bool;

    /// Analyze the given logs, most recent first
    fn analyze<'a>(
        &'a self,
        logs: &'a [MonitoringLog],
        focus_area: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<LlmAnalysis, AnalysisError>> + Send + 'a>>;
}

/// Analyzer used when LLM monitoring is switched off
///
/// Rejects every request with a distinguishable error instead of
/// fabricating a verdict.
pub struct DisabledAnalyzer;

impl Analyzer for DisabledAnalyzer {
    fn is_enabled(&self) -> bool {
        false
    }

    fn analyze<'a>(
        &'a self,
        _logs: &'a [MonitoringLog],
        _focus_area: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<LlmAnalysis, AnalysisError>> + Send + 'a>> {
        Box::pin(async { Err(AnalysisError::Disabled) })
    }
}

/// Raw verdict shape expected from the provider
#[derive(Debug, Deserialize)]
struct VerdictPayload {
    system_state: String,
    analysis: String,
    #[serde(default)]
    suggestions: Vec<String>,
    confidence: f64,
}

/// Network-backed analyzer delegating transport to an [`LlmBackend`]
pub struct LlmAnalyzer {
    backend: Arc<dyn LlmBackend>,
}

impl LlmAnalyzer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Format recent logs into a structured prompt
    ///
    /// Includes a per-log digest (status, severity, issues) and clear
    /// instructions for the expected JSON reply.
    pub fn format_prompt(logs: &[MonitoringLog], focus_area: Option<&str>) -> String {
        let warning_count = logs
            .iter()
            .filter(|log| log.result.status == HealthStatus::Warning)
            .count();
        let critical_count = logs
            .iter()
            .filter(|log| log.result.status == HealthStatus::Critical)
            .count();

        let mut prompt = String::new();
        prompt.push_str(
            "You are analyzing recent health-monitoring logs from a multi-module system.\n\n",
        );
        prompt.push_str(&format!(
            "Window: {} log(s), {} WARNING, {} CRITICAL, most recent first.\n",
            logs.len(),
            warning_count,
            critical_count
        ));
        if let Some(focus) = focus_area {
            prompt.push_str(&format!("Focus the analysis on: {focus}\n"));
        }
        prompt.push('\n');

        for log in logs {
            prompt.push_str(&format!(
                "[{}] source={} type={} status={} severity={:.2}\n",
                log.timestamp.format("%Y-%m-%d %H:%M:%S"),
                log.source,
                log.event_type,
                log.result.status,
                log.result.severity_score
            ));
            for issue in &log.result.detected_issues {
                prompt.push_str(&format!("  - {issue}\n"));
            }
        }

        prompt.push_str(
            "\nRespond with a single JSON object with exactly these fields:\n\
             {\n\
               \"system_state\": \"NORMAL\" | \"WARNING\" | \"CRITICAL\",\n\
               \"analysis\": string,\n\
               \"suggestions\": [string],\n\
               \"confidence\": number between 0 and 1\n\
             }\n",
        );
        prompt
    }

    /// Extract the JSON portion of a provider reply
    ///
    /// Models sometimes wrap JSON in markdown fences or surround it with
    /// prose; this finds the JSON object within.
    fn extract_json(text: &str) -> String {
        let text = text.trim();

        if let Some(start) = text.find("```json") {
            let body = &text[start + 7..];
            if let Some(end) = body.find("```") {
                return body[..end].trim().to_string();
            }
        }

        if let Some(start) = text.find("```") {
            let body = &text[start + 3..];
            if let Some(end) = body.find("```") {
                let candidate = body[..end].trim();
                if candidate.starts_with('{') && candidate.ends_with('}') {
                    return candidate.to_string();
                }
            }
        }

        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                return text[start..=end].to_string();
            }
        }

        text.to_string()
    }

    /// Parse a raw completion into a typed verdict
    fn parse_verdict(text: &str) -> Result<LlmAnalysis, AnalysisError> {
        let json_text = Self::extract_json(text);
        let payload: VerdictPayload = serde_json::from_str(&json_text).map_err(|e| {
            AnalysisError::InvalidResponse(format!(
                "Failed to parse verdict JSON: {e}. Response was: {json_text}"
            ))
        })?;

        let system_state = HealthStatus::parse(&payload.system_state).ok_or_else(|| {
            AnalysisError::InvalidResponse(format!(
                "Unknown system_state '{}'",
                payload.system_state
            ))
        })?;

        Ok(LlmAnalysis {
            timestamp: Utc::now(),
            system_state,
            analysis: payload.analysis,
            suggestions: payload.suggestions,
            confidence: payload.confidence.clamp(0.0, 1.0),
        })
    }
}

impl Analyzer for LlmAnalyzer {
    fn is_enabled(&self) -> bool {
        true
    }

    fn analyze<'a>(
        &'a self,
        logs: &'a [MonitoringLog],
        focus_area: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<LlmAnalysis, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            if logs.is_empty() {
                return Err(AnalysisError::NoLogs);
            }

            info!("Starting LLM analysis over {} log(s)", logs.len());
            let prompt = Self::format_prompt(logs, focus_area);
            debug!("Analysis prompt is {} bytes", prompt.len());

            let completion = self.backend.complete(&prompt).await.inspect_err(|e| {
                warn!("LLM analysis failed: {e}");
            })?;

            let verdict = Self::parse_verdict(&completion)?;
            info!(
                "LLM analysis completed: state={}, confidence={:.2}",
                verdict.system_state, verdict.confidence
            );
            Ok(verdict)
        })
    }
}
