//! Vertex AI LLM Provider
//!
//! Text prediction against the Vertex AI publisher-model `:predict` endpoint.
//! Authentication is a bearer access token (for example the output of
//! `gcloud auth print-access-token`); without one the request is sent bare.

use std::time::Duration;

use async_trait::async_trait;
use react_core::{
    error::{AgentError, Result},
    provider::{Completion, GenerationOptions, LlmProvider},
};
use serde::{Deserialize, Serialize};

/// Default regional endpoint
pub const DEFAULT_API_ENDPOINT: &str = "us-central1-aiplatform.googleapis.com";

/// Vertex AI provider configuration
#[derive(Clone, Debug)]
pub struct VertexConfig {
    /// API host, e.g. `us-central1-aiplatform.googleapis.com`
    pub api_endpoint: String,

    /// GCP project that owns the quota
    pub project_id: String,

    /// Model location
    pub location: String,

    /// Bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.into(),
            project_id: String::new(),
            location: "us-central1".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl VertexConfig {
    pub fn from_env() -> Self {
        let api_endpoint = std::env::var("VERTEX_API_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_API_ENDPOINT.into());
        let project_id = std::env::var("GCP_PROJECT_ID").unwrap_or_default();
        let api_key = std::env::var("VERTEX_API_KEY").ok().filter(|k| !k.is_empty());

        Self {
            api_endpoint,
            project_id,
            api_key,
            ..Default::default()
        }
    }

    fn predict_url(&self, model: &str) -> String {
        // bare hosts get https; a full base URL is taken as-is
        let base = if self.api_endpoint.contains("://") {
            self.api_endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.api_endpoint)
        };

        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            base, self.project_id, self.location, model
        )
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
    parameters: Parameters<'a>,
}

#[derive(Serialize)]
struct Instance<'a> {
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    temperature: f32,
    max_output_tokens: u32,
    top_k: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    #[serde(default)]
    content: String,
}

/// Vertex AI LLM provider
pub struct VertexProvider {
    http: reqwest::Client,
    config: VertexConfig,
}

impl VertexProvider {
    pub fn from_config(config: VertexConfig) -> Result<Self> {
        if config.project_id.is_empty() {
            return Err(AgentError::Config(
                "you must set the project-id flag or GCP_PROJECT_ID environment variable".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(VertexConfig::from_env())
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }
}

#[async_trait]
impl LlmProvider for VertexProvider {
    async fn health_check(&self) -> Result<bool> {
        // no cheap endpoint to call; configuration is all we can verify
        Ok(!self.config.project_id.is_empty())
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion> {
        let body = PredictRequest {
            instances: [Instance { content: prompt }],
            parameters: Parameters {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                top_k: options.top_k,
                top_p: options.top_p,
                stop_sequences: (!options.stop_sequences.is_empty())
                    .then_some(options.stop_sequences.as_slice()),
            },
        };

        let mut request = self.http.post(self.config.predict_url(&options.model)).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| AgentError::Llm(format!("failed to read response: {}", e)))?;
            return Err(AgentError::Llm(format!(
                "request failed with status code {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("failed to decode response: {}", e)))?;

        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Llm("no predictions returned".into()))?;

        Ok(Completion::text(prediction.content, options.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            tx.send(String::from_utf8_lossy(&raw).into_owned()).ok();
        });

        (format!("http://{}", addr), rx)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn provider(endpoint: String) -> VertexProvider {
        VertexProvider::from_config(VertexConfig {
            api_endpoint: endpoint,
            project_id: "my-project".into(),
            api_key: Some("secret".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_predict_url() {
        let config = VertexConfig {
            project_id: "p".into(),
            ..Default::default()
        };
        assert_eq!(
            config.predict_url("text-bison@001"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1/publishers/google/models/text-bison@001:predict"
        );
    }

    #[test]
    fn test_project_id_required() {
        let err = VertexProvider::from_config(VertexConfig::default()).err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_parameters() {
        let (endpoint, request) =
            serve_once("200 OK", r#"{"predictions": [{"content": "hello back"}]}"#).await;

        let options = GenerationOptions {
            model: "text-bison@001".into(),
            ..GenerationOptions::default()
        };
        let completion = provider(endpoint).generate("hello", &options).await.unwrap();
        assert_eq!(completion.content, "hello back");

        let raw = request.await.unwrap();
        assert!(raw.starts_with(
            "POST /v1/projects/my-project/locations/us-central1/publishers/google/models/text-bison@001:predict"
        ));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer secret"));

        let body: serde_json::Value =
            serde_json::from_str(&raw[raw.find("\r\n\r\n").unwrap() + 4..]).unwrap();
        assert_eq!(body["instances"][0]["content"], "hello");
        assert_eq!(body["parameters"]["maxOutputTokens"], 1024);
        assert_eq!(body["parameters"]["topK"], 40);
        assert!(body["parameters"].get("stopSequences").is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_is_llm_error() {
        let (endpoint, _request) = serve_once("403 Forbidden", r#"{"error": "denied"}"#).await;

        let err = provider(endpoint)
            .generate("hello", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("denied"));
    }

    #[tokio::test]
    async fn test_empty_predictions_is_llm_error() {
        let (endpoint, _request) = serve_once("200 OK", r#"{"predictions": []}"#).await;

        let err = provider(endpoint)
            .generate("hello", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no predictions returned"));
    }
}
