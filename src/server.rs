//! HTTP surface for the monitoring service
//!
//! Five endpoints under `/monitor`: event submission, aggregate status,
//! filtered log queries, on-demand LLM analysis, and a liveness probe.
//! Handlers hold no state of their own; everything flows through the
//! shared [`AppState`].

use crate::ai::Analyzer;
use crate::engine::MonitorEngine;
use crate::error::AnalysisError;
use crate::events::{Event, HealthStatus, LlmAnalysis, MonitoringLog, Timestamp};
use crate::store::{CriticalEventInfo, LogFilter, LogStore};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of logs returned when the query gives no limit
const DEFAULT_QUERY_LIMIT: usize = 100;

/// Shared state handed to every request handler
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    pub store: Arc<LogStore>,
    pub analyzer: Arc<dyn Analyzer>,
    pub started_at: Instant,
    /// Upper bound for the logs endpoint `limit` parameter
    pub max_query_limit: usize,
    /// Window size for the aggregate status rollup
    pub status_window: usize,
    /// Logs sampled per analysis when the request gives no count
    pub default_sample_size: usize,
    /// Wall-clock budget for one analysis request
    pub analysis_timeout: Duration,
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/monitor/data", post(submit_event))
        .route("/monitor/status", get(monitor_status))
        .route("/monitor/logs", get(monitor_logs))
        .route("/monitor/analyze", post(analyze_logs))
        .route("/monitor/health", get(health_check))
        .with_state(state)
}

/// Error response carrying an HTTP status and a message body
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        let status = match e {
            AnalysisError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::NoLogs => StatusCode::BAD_REQUEST,
            AnalysisError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AnalysisError::BackendError(_)
            | AnalysisError::InvalidResponse(_)
            | AnalysisError::HttpError(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SubmitResponse {
    success: bool,
    log_id: u64,
    detected_status: HealthStatus,
    reason: String,
}

/// POST /monitor/data
///
/// Validates and classifies one event, persists the derived log, and
/// returns the verdict synchronously.
async fn submit_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Event>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let result = state
        .engine
        .evaluate(&event)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    if result.status != HealthStatus::Normal {
        warn!(
            "Event from '{}' classified {}: {}",
            event.source, result.status, result.reasoning
        );
    }

    let detected_status = result.status;
    let reason = result.reasoning.clone();
    let log_id = state.store.append(
        &event.source,
        &event.event_type,
        event.effective_timestamp(),
        &event.data,
        result,
    );

    Ok(Json(SubmitResponse {
        success: true,
        log_id,
        detected_status,
        reason,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
    current_status: HealthStatus,
    avg_severity: f64,
    recent_issues: Vec<String>,
    total_logs_processed: u64,
    warning_count: u64,
    critical_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_update: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_critical_event: Option<CriticalEventInfo>,
    uptime_seconds: u64,
    llm_enabled: bool,
}

/// GET /monitor/status
async fn monitor_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let health = state.store.aggregate_health(state.status_window);
    let stats = state.store.stats();

    Json(StatusResponse {
        current_status: health.status,
        avg_severity: health.avg_severity,
        recent_issues: health.recent_issues,
        total_logs_processed: stats.total_processed,
        warning_count: stats.warning_count,
        critical_count: stats.critical_count,
        last_update: stats.last_update,
        last_critical_event: stats.last_critical_event,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        llm_enabled: state.analyzer.is_enabled(),
    })
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
    status: Option<String>,
    source: Option<String>,
    /// Inclusive lower timestamp bound, RFC 3339
    since: Option<Timestamp>,
    /// Inclusive upper timestamp bound, RFC 3339
    until: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LogsResponse {
    total_count: usize,
    returned_count: usize,
    logs: Vec<MonitoringLog>,
}

/// GET /monitor/logs
///
/// Filters combine with AND semantics; results come back most recent
/// first. An unknown status value is a client error, not an empty result.
async fn monitor_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let status = match &query.status {
        Some(raw) => Some(HealthStatus::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Unknown status '{raw}', expected NORMAL, WARNING, or CRITICAL"
            ))
        })?),
        None => None,
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_QUERY_LIMIT)
        .min(state.max_query_limit);

    let filter = LogFilter {
        source: query.source.clone(),
        status,
        since: query.since,
        until: query.until,
    };
    let result = state.store.query(&filter, limit);

    Ok(Json(LogsResponse {
        total_count: result.total_matched,
        returned_count: result.logs.len(),
        logs: result.logs,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeRequest {
    num_recent_logs: Option<usize>,
    focus_area: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnalyzeResponse {
    success: bool,
    analyzed_logs: usize,
    analysis: LlmAnalysis,
}

/// POST /monitor/analyze
///
/// Samples the most recent logs, runs the LLM analysis pass, and attaches
/// the verdict to the logs it covered. The store is not locked while the
/// provider call is in flight.
async fn analyze_logs(
    State(state): State<Arc<AppState>>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    if !state.analyzer.is_enabled() {
        return Err(AnalysisError::Disabled.into());
    }

    let sample_size = request.num_recent_logs.unwrap_or(state.default_sample_size);
    if sample_size == 0 {
        return Err(ApiError::bad_request("num_recent_logs must be positive"));
    }

    let logs = state.store.recent(sample_size);
    if logs.is_empty() {
        return Err(AnalysisError::NoLogs.into());
    }

    let analysis = tokio::time::timeout(
        state.analysis_timeout,
        state
            .analyzer
            .analyze(&logs, request.focus_area.as_deref()),
    )
    .await
    .map_err(|_| AnalysisError::Timeout)??;

    let log_ids: Vec<u64> = logs.iter().map(|log| log.log_id).collect();
    state.store.record_analysis(&log_ids, &analysis);
    info!(
        "Analysis over {} log(s) completed: state={}",
        log_ids.len(),
        analysis.system_state
    );

    Ok(Json(AnalyzeResponse {
        success: true,
        analyzed_logs: log_ids.len(),
        analysis,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    llm_enabled: bool,
    logs_stored: usize,
}

/// GET /monitor/health
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        llm_enabled: state.analyzer.is_enabled(),
        logs_stored: state.store.len(),
    })
}
