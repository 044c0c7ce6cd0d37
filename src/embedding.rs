//! Embedding client abstraction and HTTP implementation.
//!
//! [`EmbeddingClient`] is the seam between the pipelines and the external
//! embedding service: one production implementation calling an
//! OpenAI-compatible `POST /embeddings` endpoint, and in-memory fakes in
//! tests.
//!
//! # Retry strategy
//!
//! Embedding calls are idempotent, so the HTTP client retries transient
//! failures with exponential backoff (1s, 2s, 4s, ... capped at 32s):
//! - HTTP 429 and 5xx → retry
//! - network errors → retry
//! - other 4xx (e.g. invalid credentials) → fail immediately
//!
//! All failures surface as a generic unavailability error; the service's
//! error text is logged, never returned to callers.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::EngineError;

/// Environment variable holding the bearer token for the embedding API.
pub const EMBED_API_KEY_VAR: &str = "LECTERN_EMBED_API_KEY";

/// A batch embedding backend. Returns one vector per input text,
/// preserving input order.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Vector dimensionality this client produces.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}

/// Production client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                warn!(error = %e, "failed to build embedding HTTP client");
                EngineError::RetrievalUnavailable
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }

    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Attempt> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Ok(key) = std::env::var(EMBED_API_KEY_VAR) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| Attempt::Transient(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Attempt::Transient(e.to_string()))?;
            return parse_embeddings_response(&json).map_err(Attempt::Permanent);
        }

        let text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(Attempt::Transient(format!("{status}: {text}")))
        } else {
            // Client error (bad credentials, malformed request): retrying
            // cannot help.
            Err(Attempt::Permanent(format!("{status}: {text}")))
        }
    }
}

enum Attempt {
    Transient(String),
    Permanent(String),
}

#[async_trait]
impl EmbeddingClient for HttpEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.request_once(texts).await {
                Ok(vectors) => {
                    check_vectors(&vectors, texts.len(), self.dims)?;
                    return Ok(vectors);
                }
                Err(Attempt::Permanent(detail)) => {
                    warn!(detail = %detail, "embedding request failed permanently");
                    return Err(EngineError::RetrievalUnavailable);
                }
                Err(Attempt::Transient(detail)) => {
                    warn!(attempt, detail = %detail, "embedding request failed, will retry");
                    last_err = detail;
                }
            }
        }

        warn!(detail = %last_err, "embedding retries exhausted");
        Err(EngineError::RetrievalUnavailable)
    }
}

/// Check a successful response against the contract: one vector per
/// input text, each of the configured dimensionality. A violation is
/// service misbehavior and reported as unavailability, like any other
/// malformed response.
fn check_vectors(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dims: usize,
) -> Result<(), EngineError> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        warn!(
            got = bad.len(),
            expected = dims,
            "embedding service returned unexpected dimensionality"
        );
        return Err(EngineError::RetrievalUnavailable);
    }
    if vectors.len() != expected_count {
        warn!(
            got = vectors.len(),
            expected = expected_count,
            "embedding count does not match input count"
        );
        return Err(EngineError::RetrievalUnavailable);
    }
    Ok(())
}

/// Extract the `data[].embedding` arrays, reordered by `data[].index`
/// so output order always matches input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| "missing data array in embeddings response".to_string())?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| "missing embedding in response item".to_string())?;
        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Cosine similarity between two vectors; 0.0 for mismatched or empty input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reorders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] },
            ]
        });
        let vectors = parse_embeddings_response(&json).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn parse_rejects_missing_data() {
        assert!(parse_embeddings_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn wrong_dimensionality_is_unavailability_not_config_error() {
        let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0]];
        let err = check_vectors(&vectors, 2, 3).unwrap_err();
        assert!(matches!(err, EngineError::RetrievalUnavailable));
    }

    #[test]
    fn vector_count_must_match_input_count() {
        let vectors = vec![vec![1.0, 0.0]];
        assert!(check_vectors(&vectors, 2, 2).is_err());
        assert!(check_vectors(&vectors, 1, 2).is_ok());
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
