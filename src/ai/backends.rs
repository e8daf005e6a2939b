use crate::error::AnalysisError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Trait for LLM provider transports
///
/// A backend takes a fully formatted prompt and returns the provider's raw
/// text completion. Prompt construction and verdict parsing live in the
/// analyzer so every backend shares the same fail-closed parsing path.
pub trait LlmBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>>;
}

fn http_client(timeout: Duration) -> Result<Client, AnalysisError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(AnalysisError::HttpError)
}

fn map_request_error(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout
    } else {
        AnalysisError::HttpError(e)
    }
}

/// OpenAI-compatible chat completions backend
///
/// Works against api.openai.com or any compatible endpoint (the original
/// deployment used such a provider).
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

impl OpenAiBackend {
    /// Create a backend against the default OpenAI API
    pub fn new(
        api_key: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        Self::with_base_url(
            api_key,
            model,
            "https://api.openai.com/v1".to_string(),
            max_tokens,
            timeout,
        )
    }

    /// Create a backend against an OpenAI-compatible endpoint
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model,
            base_url,
            max_tokens,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl LlmBackend for OpenAiBackend {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: "You are an operations health analyst. Respond with a single \
                                  JSON object and nothing else."
                            .to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: prompt.to_string(),
                    },
                ],
                temperature: 0.1,
                max_tokens: self.max_tokens,
            };

            let response = self
                .client
                .post(self.api_url())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
                .map_err(map_request_error)?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AnalysisError::BackendError(format!(
                    "Provider returned error {status}: {error_text}"
                )));
            }

            let chat_response: ChatResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse provider response: {e}"))
            })?;

            if let Some(error) = chat_response.error {
                return Err(AnalysisError::BackendError(format!(
                    "Provider error: {}",
                    error.message
                )));
            }

            chat_response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| {
                    AnalysisError::InvalidResponse("No choices in provider response".to_string())
                })
        })
    }
}

/// Ollama backend for local inference
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    pub fn new(
        endpoint: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            model,
            max_tokens,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/generate", self.endpoint.trim_end_matches('/'))
    }
}

impl LlmBackend for OllamaBackend {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = OllamaRequest {
                model: self.model.clone(),
                prompt: prompt.to_string(),
                stream: false,
                options: OllamaOptions {
                    temperature: 0.1,
                    num_predict: self.max_tokens,
                },
            };

            let response = self
                .client
                .post(self.api_url())
                .json(&request)
                .send()
                .await
                .map_err(map_request_error)?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AnalysisError::BackendError(format!(
                    "Ollama returned error {status}: {error_text}"
                )));
            }

            let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse Ollama response: {e}"))
            })?;

            if let Some(error) = ollama_response.error {
                return Err(AnalysisError::BackendError(format!("Ollama error: {error}")));
            }

            Ok(ollama_response.response)
        })
    }
}

/// Canned response kinds for [`MockBackend`]
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this text as the completion
    Reply(String),
    /// Fail with a backend error carrying this message
    Failure(String),
    /// Fail with a timeout
    Timeout,
}

/// Backend returning canned responses, for tests and dry runs
pub struct MockBackend {
    response: MockResponse,
}

impl MockBackend {
    /// Backend that replies with the given completion text
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            response: MockResponse::Reply(text.into()),
        }
    }

    /// Backend that always fails with a communication error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: MockResponse::Failure(message.into()),
        }
    }

    /// Backend that always times out
    pub fn timing_out() -> Self {
        Self {
            response: MockResponse::Timeout,
        }
    }
}

impl LlmBackend for MockBackend {
    fn complete<'a>(
        &'a self,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AnalysisError>> + Send + 'a>> {
        let response = self.response.clone();
        Box::pin(async move {
            match response {
                MockResponse::Reply(text) => Ok(text),
                MockResponse::Failure(message) => Err(AnalysisError::BackendError(message)),
                MockResponse::Timeout => Err(AnalysisError::Timeout),
            }
        })
    }
}
