//! Generative answers for utterances the knowledge base cannot match.

use crate::error::{FallbackError, GateError};
use crate::gate::BackendGate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A generative language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, FallbackError>;
}

/// Client for Ollama's `/api/generate` endpoint (non-streaming).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    /// # Errors
    ///
    /// Returns [`FallbackError::Service`] if the HTTP client cannot be built
    /// (for example when the TLS backend fails to initialize).
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FallbackError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, FallbackError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FallbackError::Service(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let body: GenerateResponse = resp.json().await?;
        Ok(body.response)
    }
}

/// Applies the fallback policy around a [`LanguageModel`]: bounded wall-clock
/// time, serialized access, and rejection of blank output.
#[derive(Clone)]
pub struct FallbackResponder {
    model: Arc<dyn LanguageModel>,
    gate: BackendGate,
    timeout: Duration,
    enabled: bool,
}

impl std::fmt::Debug for FallbackResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackResponder")
            .field("gate", &self.gate)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl FallbackResponder {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            gate: BackendGate::new("llm", 1),
            timeout,
            enabled: true,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.gate = BackendGate::new("llm", max_concurrent);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Generates an answer within the configured timeout.
    pub async fn respond(&self, utterance: &str) -> Result<String, FallbackError> {
        self.respond_within(utterance, self.timeout).await
    }

    /// Like [`respond`](Self::respond) but never waits longer than `budget`.
    pub async fn respond_within(
        &self,
        utterance: &str,
        budget: Duration,
    ) -> Result<String, FallbackError> {
        if !self.enabled {
            return Err(FallbackError::Disabled);
        }
        let budget = budget.min(self.timeout);
        let started = Instant::now();

        let model = Arc::clone(&self.model);
        let prompt = utterance.to_string();
        let outcome = self
            .gate
            .run(budget, async move { model.generate(&prompt).await })
            .await;

        let result = match outcome {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    Err(FallbackError::EmptyResponse)
                } else {
                    Ok(text.to_string())
                }
            }
            Ok(Err(e)) => Err(e),
            Err(GateError::Timeout { after, .. }) => Err(FallbackError::Timeout(after)),
            Err(e) => Err(FallbackError::Service(e.to_string())),
        };

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "language model call finished"
        );
        result
    }
}
