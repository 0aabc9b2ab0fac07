//! Ollama-backed content generator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::ContentGenerator;

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Generates content with Ollama's `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaContentGenerator {
    /// HTTP client
    client: Client,

    /// Ollama server URL
    url: String,

    /// Model name
    model: String,
}

impl OllamaContentGenerator {
    /// Create a generator with the default timeout.
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(url, model, DEFAULT_TIMEOUT)
    }

    /// Create a generator with a request timeout.
    pub fn with_timeout(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url: url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the Ollama server is available.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/version", self.url))
            .send()
            .await
            .context("Failed to check Ollama health")?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ContentGenerator for OllamaContentGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        debug!("Calling Ollama model {} ({} chars)", self.model, prompt.len());

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&payload)
            .send()
            .await
            .context("Failed to call Ollama generate API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error (status {}): {}", status, error_text);
        }

        #[derive(serde::Deserialize)]
        struct Response {
            response: String,
        }

        let data: Response = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(data.response)
    }
}
