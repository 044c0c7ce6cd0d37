//! Error taxonomy for the ingestion and answer pipelines.
//!
//! Input errors (`SizeLimitExceeded`, `UnreadableDocument`, `EncodingError`)
//! carry enough detail for the caller to fix the input. Transient service
//! errors deliberately carry a generic message only; the underlying service
//! error text is logged, never returned.

use thiserror::Error;

use crate::models::IngestState;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Document exceeds the configured size ceiling. User-correctable.
    #[error("document size {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: usize, limit: usize },

    /// No extractable characters (e.g. a scanned, image-only PDF).
    #[error("no text could be extracted from the document")]
    UnreadableDocument,

    /// Plain-text decode failed with every supported encoding.
    #[error("could not decode text file with any supported encoding")]
    EncodingError,

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The object storage collaborator could not deliver the document bytes.
    #[error("document storage unavailable")]
    StorageUnavailable,

    /// Query embedding or vector search failed after retries.
    #[error("retrieval service unavailable")]
    RetrievalUnavailable,

    /// Generation call failed. Never retried: the call is not idempotent.
    #[error("generation service unavailable")]
    GenerationUnavailable,

    /// Vector index upsert/delete failed after retries.
    #[error("vector index unavailable")]
    IndexUnavailable,

    /// Configured embedding dimensionality differs from the index's.
    /// Detected at startup; a process with this error never serves requests.
    #[error("embedding dimension {embedding} does not match index dimension {index}")]
    DimensionMismatch { embedding: usize, index: usize },

    /// Configuration failed validation. Startup-fatal, like
    /// `DimensionMismatch`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// True for errors worth retrying with backoff on an idempotent call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::RetrievalUnavailable
                | EngineError::GenerationUnavailable
                | EngineError::IndexUnavailable
                | EngineError::StorageUnavailable
        )
    }
}

/// Ingestion failure with partial-progress accounting.
///
/// A failure anywhere aborts the document (there is no resumable state), but
/// the caller learns which stage failed and how far the pipeline got, e.g.
/// "12 of 45 chunks embedded before failure".
#[derive(Debug, Error)]
#[error("ingestion failed at {failed_at:?}: {source} ({chunks_embedded}/{chunks_created} chunks embedded, {vectors_stored} vectors stored)")]
pub struct IngestFailure {
    /// The state the pipeline had reached when the error occurred.
    pub failed_at: IngestState,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub vectors_stored: usize,
    #[source]
    pub source: EngineError,
}

impl IngestFailure {
    pub fn at(state: IngestState, source: EngineError) -> Self {
        Self {
            failed_at: state,
            chunks_created: 0,
            chunks_embedded: 0,
            vectors_stored: 0,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EngineError::RetrievalUnavailable.is_transient());
        assert!(EngineError::IndexUnavailable.is_transient());
        assert!(!EngineError::UnreadableDocument.is_transient());
        assert!(!EngineError::DimensionMismatch {
            embedding: 1536,
            index: 768
        }
        .is_transient());
    }

    #[test]
    fn ingest_failure_reports_partial_progress() {
        let failure = IngestFailure {
            failed_at: IngestState::Chunked,
            chunks_created: 45,
            chunks_embedded: 12,
            vectors_stored: 0,
            source: EngineError::RetrievalUnavailable,
        };
        let msg = failure.to_string();
        assert!(msg.contains("12/45"));
        assert!(msg.contains("Chunked"));
    }
}
