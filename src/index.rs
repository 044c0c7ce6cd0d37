//! Vector index client: owner-scoped upsert, query, and delete.
//!
//! The central security invariant of the system lives here: every stored
//! vector carries its owner id, and **every** query this client issues
//! attaches an owner filter. Isolation is enforced by the client, never
//! assumed from the service.
//!
//! Vector ids are deterministic — `sha256(owner/document/chunk_index)` —
//! so re-ingesting the same document overwrites instead of duplicating.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::IndexConfig;
use crate::error::EngineError;
use crate::models::{ScoredVector, VectorMetadata, VectorRecord};

/// Environment variable holding the bearer token for the index service.
pub const INDEX_API_KEY_VAR: &str = "LECTERN_INDEX_API_KEY";

/// Deterministic vector id for (owner, document, chunk index).
///
/// A stable hash rather than a database sequence, so upserts are
/// idempotent across processes.
pub fn vector_id(owner_id: &str, document_id: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(b"/");
    hasher.update(document_id.as_bytes());
    hasher.update(b"/");
    hasher.update(chunk_index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of an upsert. A partial batch failure reports exactly which
/// ids failed; it is never silently swallowed.
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    pub upserted: usize,
    pub failed_ids: Vec<String>,
}

/// Owner-scoped vector index operations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert records, idempotent by id. Batched internally to bound
    /// request size.
    async fn upsert(
        &self,
        owner_id: &str,
        records: &[VectorRecord],
    ) -> Result<UpsertReport, EngineError>;

    /// Return up to `top_k` results for `owner_id` only, sorted by
    /// descending similarity score.
    async fn query(
        &self,
        owner_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredVector>, EngineError>;

    /// Remove all vectors for one document. Used on deletion and before
    /// re-ingestion so changed chunk boundaries cannot leave stale vectors.
    async fn delete_document(&self, owner_id: &str, document_id: &str)
        -> Result<(), EngineError>;
}

/// Production client for a REST vector index service.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    endpoint: String,
    upsert_batch_size: usize,
}

impl HttpVectorIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                warn!(error = %e, "failed to build index HTTP client");
                EngineError::IndexUnavailable
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            upsert_batch_size: config.upsert_batch_size.max(1),
        })
    }

    fn request(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .json(body);
        if let Ok(key) = std::env::var(INDEX_API_KEY_VAR) {
            request = request.bearer_auth(key);
        }
        request
    }

    async fn upsert_batch(&self, batch: &[VectorRecord]) -> Result<(), String> {
        let vectors: Vec<serde_json::Value> = batch
            .iter()
            .map(|record| {
                serde_json::json!({
                    "id": record.id,
                    "values": record.values,
                    "metadata": {
                        "owner_id": record.owner_id,
                        "document_id": record.metadata.document_id,
                        "document_name": record.metadata.document_name,
                        "chunk_index": record.metadata.chunk_index,
                        "excerpt": record.metadata.excerpt,
                        "total_chunks": record.metadata.total_chunks,
                        "ingested_at": record.metadata.ingested_at.to_rfc3339(),
                    },
                })
            })
            .collect();

        let response = self
            .request("/vectors/upsert", &serde_json::json!({ "vectors": vectors }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!(
                "{status}: {}",
                response.text().await.unwrap_or_default()
            ))
        }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(
        &self,
        _owner_id: &str,
        records: &[VectorRecord],
    ) -> Result<UpsertReport, EngineError> {
        let mut report = UpsertReport::default();

        for batch in records.chunks(self.upsert_batch_size) {
            match self.upsert_batch(batch).await {
                Ok(()) => report.upserted += batch.len(),
                Err(detail) => {
                    warn!(batch_len = batch.len(), detail = %detail, "vector upsert batch failed");
                    report
                        .failed_ids
                        .extend(batch.iter().map(|r| r.id.clone()));
                }
            }
        }

        if report.upserted == 0 && !records.is_empty() {
            return Err(EngineError::IndexUnavailable);
        }
        Ok(report)
    }

    async fn query(
        &self,
        owner_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredVector>, EngineError> {
        // The owner filter is attached unconditionally.
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "filter": { "owner_id": owner_id },
            "includeMetadata": true,
        });

        let response = self.request("/query", &body).send().await.map_err(|e| {
            warn!(error = %e, "vector query request failed");
            EngineError::RetrievalUnavailable
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, detail = %text, "vector query returned an error");
            return Err(EngineError::RetrievalUnavailable);
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            warn!(error = %e, "vector query response was not JSON");
            EngineError::RetrievalUnavailable
        })?;
        parse_query_response(&json).ok_or(EngineError::RetrievalUnavailable)
    }

    async fn delete_document(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "filter": { "owner_id": owner_id, "document_id": document_id },
        });

        let response = self
            .request("/vectors/delete", &body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "vector delete request failed");
                EngineError::IndexUnavailable
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            warn!(status = %response.status(), "vector delete returned an error");
            Err(EngineError::IndexUnavailable)
        }
    }
}

fn parse_query_response(json: &serde_json::Value) -> Option<Vec<ScoredVector>> {
    let matches = json.get("matches")?.as_array()?;
    let mut hits = Vec::with_capacity(matches.len());

    for entry in matches {
        let metadata = entry.get("metadata")?;
        hits.push(ScoredVector {
            id: entry.get("id")?.as_str()?.to_string(),
            score: entry.get("score")?.as_f64()? as f32,
            metadata: VectorMetadata {
                document_id: str_field(metadata, "document_id"),
                document_name: str_field(metadata, "document_name"),
                chunk_index: metadata
                    .get("chunk_index")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
                excerpt: str_field(metadata, "excerpt"),
                total_chunks: metadata
                    .get("total_chunks")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
                ingested_at: metadata
                    .get("ingested_at")
                    .and_then(|v| v.as_str())
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(chrono::Utc::now),
            },
        });
    }

    // Defend the ordering contract even if the service misbehaves.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Some(hits)
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
