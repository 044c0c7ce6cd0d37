//! Generation client: one call per answer, no retries.
//!
//! Generation is the only non-idempotent external call in the system, so
//! failures are never retried — a duplicate completion is a duplicate
//! cost. Parameters are clamped to safe ranges before the request.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{GenerationConfig, MAX_TOKENS_RANGE, TEMPERATURE_RANGE};
use crate::error::EngineError;
use crate::prompt::Prompt;

/// Environment variable holding the bearer token for the generation API.
pub const GENERATION_API_KEY_VAR: &str = "LECTERN_GENERATION_API_KEY";

/// Bounded generation parameters.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    /// Clamp both knobs into their allowed ranges.
    pub fn bounded(max_tokens: u32, temperature: f32) -> Self {
        let (tok_lo, tok_hi) = MAX_TOKENS_RANGE;
        let (temp_lo, temp_hi) = TEMPERATURE_RANGE;
        Self {
            max_tokens: max_tokens.clamp(tok_lo, tok_hi),
            temperature: temperature.clamp(temp_lo, temp_hi),
        }
    }
}

/// A text generation backend.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &Prompt,
        params: GenerationParams,
    ) -> Result<String, EngineError>;
}

/// Production client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                warn!(error = %e, "failed to build generation HTTP client");
                EngineError::GenerationUnavailable
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationClient for HttpGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        params: GenerationParams,
    ) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.render_user_message() },
            ],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Ok(key) = std::env::var(GENERATION_API_KEY_VAR) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "generation request failed");
            EngineError::GenerationUnavailable
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, detail = %text, "generation service returned an error");
            return Err(EngineError::GenerationUnavailable);
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            warn!(error = %e, "generation response was not JSON");
            EngineError::GenerationUnavailable
        })?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                warn!("generation response missing message content");
                EngineError::GenerationUnavailable
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_clamped_to_safe_ranges() {
        let params = GenerationParams::bounded(10_000, 3.0);
        assert_eq!(params.max_tokens, 1024);
        assert_eq!(params.temperature, 1.0);

        let params = GenerationParams::bounded(1, -0.5);
        assert_eq!(params.max_tokens, 50);
        assert_eq!(params.temperature, 0.0);
    }

    #[test]
    fn in_range_params_untouched() {
        let params = GenerationParams::bounded(512, 0.7);
        assert_eq!(params.max_tokens, 512);
        assert_eq!(params.temperature, 0.7);
    }
}
