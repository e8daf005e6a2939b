use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil::ai::{Analyzer, DisabledAnalyzer, LlmAnalyzer, OllamaBackend, OpenAiBackend};
use vigil::config::{Config, LlmProvider};
use vigil::engine::MonitorEngine;
use vigil::rules::{
    AnomalyRule, ConsistencyRule, HealthRule, InvalidOutputRule, SilentFailureRule, ThresholdRule,
};
use vigil::server::{router, AppState};
use vigil::store::LogStore;

#[derive(Parser, Debug)]
#[command(name = "vigil", about = "Rule-based health monitoring service with LLM analysis")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build the rule set from configuration, in evaluation order
fn build_rules(config: &Config) -> Vec<Box<dyn HealthRule>> {
    let monitor = &config.monitor;

    let mut ceilings = ThresholdRule::default_ceilings();
    for (field, ceiling) in &monitor.ceilings {
        ceilings.insert(field.clone(), *ceiling);
    }

    vec![
        Box::new(ThresholdRule::new(ceilings, 0.25)),
        Box::new(InvalidOutputRule::with_defaults()),
        Box::new(ConsistencyRule::with_defaults()),
        Box::new(SilentFailureRule::with_defaults()),
        Box::new(AnomalyRule::new(
            monitor.min_anomaly_samples,
            monitor.z_score_threshold,
            0.1,
        )),
    ]
}

/// Build the analyzer selected by configuration
fn build_analyzer(config: &Config) -> anyhow::Result<Arc<dyn Analyzer>> {
    let llm = &config.llm;
    if !llm.enabled {
        info!("LLM analysis is disabled");
        return Ok(Arc::new(DisabledAnalyzer));
    }

    let timeout = Duration::from_secs(llm.timeout_seconds);
    let backend: Arc<dyn vigil::ai::LlmBackend> = match llm.provider {
        LlmProvider::OpenAi => {
            info!("LLM analysis enabled with OpenAI model '{}'", llm.model);
            Arc::new(
                OpenAiBackend::new(
                    llm.api_key.clone(),
                    llm.model.clone(),
                    llm.max_tokens,
                    timeout,
                )
                .context("Failed to create OpenAI backend")?,
            )
        }
        LlmProvider::Ollama => {
            info!(
                "LLM analysis enabled with Ollama model '{}' at {}",
                llm.model, llm.endpoint
            );
            Arc::new(
                OllamaBackend::new(
                    llm.endpoint.clone(),
                    llm.model.clone(),
                    llm.max_tokens,
                    timeout,
                )
                .context("Failed to create Ollama backend")?,
            )
        }
    };

    Ok(Arc::new(LlmAnalyzer::new(backend)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(
        "Starting vigil: max_logs={}, thresholds=[{}, {}], history_capacity={}",
        config.monitor.max_logs,
        config.monitor.warning_threshold,
        config.monitor.critical_threshold,
        config.monitor.history_capacity
    );

    let engine = Arc::new(MonitorEngine::new(
        build_rules(&config),
        config.monitor.thresholds(),
        config.monitor.history_capacity,
    ));
    info!("Rule engine ready with {} rule(s)", engine.rule_count());
    let store = Arc::new(LogStore::new(config.monitor.max_logs));
    let analyzer = build_analyzer(&config)?;

    let state = Arc::new(AppState {
        engine,
        store,
        analyzer,
        started_at: Instant::now(),
        max_query_limit: config.monitor.max_query_limit,
        status_window: config.monitor.status_window,
        default_sample_size: config.llm.default_sample_size,
        analysis_timeout: Duration::from_secs(config.llm.timeout_seconds),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
