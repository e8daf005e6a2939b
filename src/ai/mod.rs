/// LLM analysis adapter and backend implementations
pub mod analyzer;
pub mod backends;

pub use analyzer::{Analyzer, DisabledAnalyzer, LlmAnalyzer};
pub use backends::{LlmBackend, MockBackend, OllamaBackend, OpenAiBackend};

// Re-export the verdict type stored on monitoring logs
pub use crate::events::LlmAnalysis;
