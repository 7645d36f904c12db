//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference through the
//! `/api/generate` completion endpoint.

use std::time::Duration;

use async_trait::async_trait;
use ollama_rs::{
    generation::completion::{request::GenerationRequest, GenerationResponse},
    models::ModelOptions,
    Ollama,
};
use react_core::{
    error::{AgentError, Result},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST")
            .unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);

        Self {
            host,
            port,
            ..Default::default()
        }
    }

    /// Base URL with the port applied
    fn url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.host)
            .map_err(|e| AgentError::Config(format!("invalid Ollama host {:?}: {}", self.host, e)))?;
        url.set_port(Some(self.port))
            .map_err(|()| AgentError::Config(format!("Ollama host {:?} cannot take a port", self.host)))?;
        Ok(url)
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let url = config.url()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Ollama::new_with_client(url, config.port, http),
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Build Ollama model options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .top_k(opts.top_k)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));

        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: GenerationResponse, opts: &GenerationOptions) -> Completion {
        let prompt_tokens = response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = response.eval_count.unwrap_or(0);
        let finish_reason = if completion_tokens >= u64::from(opts.max_tokens) {
            FinishReason::Length
        } else {
            FinishReason::Stop
        };

        Completion {
            content: response.response,
            model: response.model,
            usage: Some(TokenUsage {
                prompt_tokens: prompt_tokens as u32,
                completion_tokens: completion_tokens as u32,
                total_tokens: (prompt_tokens + completion_tokens) as u32,
            }),
            finish_reason: Some(finish_reason),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion> {
        let request = GenerationRequest::new(options.model.clone(), prompt)
            .options(Self::build_options(options));

        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| AgentError::Llm(e.to_string()))?;

        Ok(Self::convert_completion(response, options))
    }
}
