//! Ollama client implementation.
//!
//! Talks to a local Ollama server through its `/api/chat` endpoint,
//! non-streaming. The enrichment pipeline only needs a single
//! system/user exchange per report, so streaming is not implemented.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::CompletionBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Ollama client for local model inference.
#[derive(Clone)]
pub struct OllamaClient {
    config: LlmConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    ///
    /// The underlying HTTP client carries the configured request
    /// timeout, so a hung server surfaces as an error instead of
    /// blocking the calling worker indefinitely.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Check if the Ollama server is running.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url);

        let messages = vec![
            OllamaMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            OllamaMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ];

        let mut options = HashMap::new();
        options.insert("temperature", serde_json::Value::from(self.config.temperature));

        let req_body = OllamaRequest {
            model: self.config.model.clone(),
            messages,
            stream: false,
            options: Some(options),
        };

        debug!(model = %self.config.model, "Sending completion request to Ollama");

        let response = self.client.post(&url).json(&req_body).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(format!("Ollama request exceeded {:?}", self.config.timeout))
            } else if e.is_connect() {
                LlmError::ServiceUnavailable(format!("Ollama unreachable at {}", self.config.base_url))
            } else {
                LlmError::HttpError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let ollama_resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(ollama_resp.message.content)
    }

    async fn is_available(&self) -> bool {
        self.check_health().await
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<&'static str, serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}
