//! Embedding oracle client
//!
//! Wraps the external text-to-vector service: given text, returns a
//! fixed-length vector or nothing. Misses (unconfigured, unreachable,
//! malformed response) are logged and reported as `None`, never as errors,
//! so callers can fall back to non-vector behavior.

use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

/// Embedding oracle settings; all optional. Missing `api_url` or `model`
/// leaves the oracle unconfigured and every `embed` call returns `None`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
}

pub struct EmbeddingClient {
    config: EmbeddingConfig,
    http: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Client with no oracle behind it; `embed` always returns `None`.
    pub fn unconfigured() -> Self {
        Self::new(EmbeddingConfig::default())
    }

    /// Embed `text`, or `None` when the oracle cannot produce a vector.
    pub async fn embed(&self, text: &str) -> Option<EmbeddingResult> {
        if text.trim().is_empty() {
            return None;
        }

        let (Some(api_url), Some(model)) = (&self.config.api_url, &self.config.model) else {
            warn!("Embedding service is not configured (missing api url or model)");
            return None;
        };

        let mut request = self
            .http
            .post(api_url)
            .json(&json!({ "model": model, "input": text }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to generate embedding: {}", e);
                return None;
            }
        };

        let body: EmbeddingResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to decode embedding response: {}", e);
                return None;
            }
        };

        let embedding = match body.data.into_iter().next() {
            Some(data) if !data.embedding.is_empty() => data.embedding,
            _ => {
                warn!("Embedding response missing embedding array");
                return None;
            }
        };

        if let Some(dimension) = self.config.dimension {
            if embedding.len() != dimension {
                warn!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    dimension,
                    embedding.len()
                );
            }
        }

        Some(EmbeddingResult { embedding })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
