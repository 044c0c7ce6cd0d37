use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Maximum raw document size accepted for ingestion, in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

fn default_max_document_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks. Must be < chunk_size.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the embeddings API (OpenAI-compatible).
    pub endpoint: String,
    pub model: String,
    /// Vector dimensionality. Must match `index.dims`; checked at startup.
    pub dims: usize,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_ingest_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embed_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_ingest_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Base URL of the vector index service.
    pub endpoint: String,
    /// Dimensionality the index was created with.
    pub dims: usize,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upsert_batch_size() -> usize {
    100
}
fn default_query_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Base URL of the chat-completions API (OpenAI-compatible).
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Number of passages retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Number of recent conversation turns included in the prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_history_turns() -> usize {
    3
}

/// Bounds enforced on per-request generation parameters.
pub const MAX_TOKENS_RANGE: (u32, u32) = (50, 1024);
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Validate invariants that must hold before any request is served.
///
/// The embedding/index dimension comparison lives here so a mismatch is a
/// startup failure, never a per-request error.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }
    if config.limits.max_document_bytes == 0 {
        anyhow::bail!("limits.max_document_bytes must be > 0");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.answer.top_k == 0 {
        anyhow::bail!("answer.top_k must be > 0");
    }

    let (lo, hi) = MAX_TOKENS_RANGE;
    if !(lo..=hi).contains(&config.generation.default_max_tokens) {
        anyhow::bail!("generation.default_max_tokens must be in [{lo}, {hi}]");
    }
    let (tlo, thi) = TEMPERATURE_RANGE;
    if !(tlo..=thi).contains(&config.generation.default_temperature) {
        anyhow::bail!("generation.default_temperature must be in [{tlo}, {thi}]");
    }

    if config.embedding.dims != config.index.dims {
        return Err(EngineError::DimensionMismatch {
            embedding: config.embedding.dims,
            index: config.index.dims,
        }
        .into());
    }

    Ok(())
}
