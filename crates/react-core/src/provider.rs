//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for text-generation backends (Ollama, Vertex AI, etc.)
//! allowing the predictor stack to work with any backend without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use react_core::provider::{GenerationOptions, LlmProvider};
//!
//! // Create a provider
//! let provider = OllamaProvider::from_env();
//!
//! // Use through the trait
//! let completion = provider.generate(&prompt, &GenerationOptions::default()).await?;
//! ```

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Configuration for LLM generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "text-bison@001")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Top-k sampling
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 1024 }
fn default_top_p() -> f32 { 0.9 }
fn default_top_k() -> u32 { 40 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The predictor stack works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion for a fully rendered prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion>;
}

#[async_trait]
impl<P: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<P> {
    async fn health_check(&self) -> Result<bool> {
        (**self).health_check().await
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion> {
        (**self).generate(prompt, options).await
    }
}

#[derive(Serialize)]
struct GenerationRecord<'a> {
    timestamp: DateTime<Utc>,
    prompt: &'a str,
    params: &'a GenerationOptions,
    response: &'a str,
    err: String,
}

/// Provider decorator that records every call as one JSON line: the prompt,
/// the parameters, and either the response or the error.
///
/// A failed log write is reported through `tracing` and never fails the call.
pub struct LoggingProvider<P> {
    inner: P,
    out: Mutex<Box<dyn Write + Send>>,
}

impl<P: LlmProvider> LoggingProvider<P> {
    pub fn new(inner: P, out: impl Write + Send + 'static) -> Self {
        Self {
            inner,
            out: Mutex::new(Box::new(out)),
        }
    }

    fn record(&self, record: &GenerationRecord<'_>) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| AgentError::Other("generation log writer poisoned".into()))?;
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for LoggingProvider<P> {
    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion> {
        let result = self.inner.generate(prompt, options).await;

        let (response, err) = match &result {
            Ok(completion) => (completion.content.as_str(), String::new()),
            Err(e) => ("", e.to_string()),
        };
        let record = GenerationRecord {
            timestamp: Utc::now(),
            prompt,
            params: options,
            response,
            err,
        };
        if let Err(e) = self.record(&record) {
            tracing::warn!(error = %e, "failed to write generation log");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenWriter, FakeProvider, SharedBuffer};

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.temperature, 0.2);
        assert_eq!(opts.max_tokens, 1024);
        assert_eq!(opts.top_k, 40);
        assert_eq!(opts.model, "llama3.2");
    }

    #[tokio::test]
    async fn test_logging_provider_records_response() {
        let buf = SharedBuffer::default();
        let provider = LoggingProvider::new(FakeProvider::always("hello"), buf.clone());

        let completion = provider
            .generate("say hi", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.content, "hello");

        let line: serde_json::Value = serde_json::from_str(buf.contents().trim()).unwrap();
        assert_eq!(line["prompt"], "say hi");
        assert_eq!(line["response"], "hello");
        assert_eq!(line["err"], "");
        assert_eq!(line["params"]["model"], "llama3.2");
    }

    #[tokio::test]
    async fn test_logging_provider_records_error() {
        let buf = SharedBuffer::default();
        let provider = LoggingProvider::new(FakeProvider::failing("offline"), buf.clone());

        let err = provider
            .generate("say hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));

        let line: serde_json::Value = serde_json::from_str(buf.contents().trim()).unwrap();
        assert_eq!(line["response"], "");
        assert!(line["err"].as_str().unwrap().contains("offline"));
    }

    #[tokio::test]
    async fn test_broken_generation_log_keeps_completion() {
        let provider = LoggingProvider::new(FakeProvider::always("hello"), BrokenWriter);

        let completion = provider
            .generate("say hi", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.content, "hello");
    }

    #[tokio::test]
    async fn test_logging_provider_wraps_shared_backend() {
        let buf = SharedBuffer::default();
        let shared: std::sync::Arc<dyn LlmProvider> = std::sync::Arc::new(FakeProvider::always("hi"));
        let provider = LoggingProvider::new(shared, buf.clone());

        assert!(provider.health_check().await.unwrap());
        provider.generate("p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(buf.lines().len(), 1);
    }
}
