//! Core data types that flow through the ingestion and answer pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum characters of chunk text carried in vector metadata.
pub const EXCERPT_METADATA_CHARS: usize = 320;
/// Maximum characters of an excerpt rendered into answer references.
pub const EXCERPT_REFERENCE_CHARS: usize = 200;

/// A document owned by one user. Immutable after ingestion; deletion
/// cascades to its vectors.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    /// Display name shown in citations (usually the file name).
    pub name: String,
    /// Opaque reference the object store resolves to bytes.
    pub source_ref: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

/// A bounded slice of a document's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    /// Position within the document, contiguous from 0.
    pub index: usize,
    pub text: String,
    /// Character offsets of this chunk within the extracted text.
    pub start: usize,
    pub end: usize,
    /// SHA-256 of the chunk text, for staleness detection.
    pub hash: String,
}

/// Metadata stored alongside each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: usize,
    /// Leading slice of the chunk text, bounded by [`EXCERPT_METADATA_CHARS`].
    pub excerpt: String,
    pub total_chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

/// A vector ready for upsert. The id is deterministic, derived from
/// (owner, document, chunk index), so re-upserting overwrites.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub owner_id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// A query hit from the vector index, scored by cosine similarity.
#[derive(Debug, Clone)]
pub struct ScoredVector {
    pub id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub document_name: String,
    pub chunk_index: usize,
    pub score: f32,
    pub excerpt: String,
}

impl Reference {
    /// Build a reference from a query hit, truncating the excerpt.
    pub fn from_hit(hit: &ScoredVector) -> Self {
        Self {
            document_name: hit.metadata.document_name.clone(),
            chunk_index: hit.metadata.chunk_index,
            score: hit.score,
            excerpt: truncate_chars(&hit.metadata.excerpt, EXCERPT_REFERENCE_CHARS),
        }
    }
}

/// One question/answer exchange in a user's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub owner_id: String,
    pub question: String,
    pub answer: String,
    pub references: Vec<Reference>,
    pub created_at: DateTime<Utc>,
}

/// Ingestion state machine. Transitions are sequential; `Failed` is
/// reachable from any state and there is no resume — callers restart
/// from `Received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestState {
    Received,
    TextExtracted,
    Chunked,
    Embedded,
    Stored,
    Complete,
}

/// Successful ingestion summary.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub document_id: String,
    pub document_name: String,
    pub chunks_created: usize,
    pub vectors_stored: usize,
}

/// Answer plus the passages that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub references: Vec<Reference>,
}

/// Per-request generation knobs; unset fields fall back to config defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    pub top_k: Option<usize>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Truncate to at most `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        let text = "héllo wörld, this is a longer sentence";
        let cut = truncate_chars(text, 10);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 13);
    }
}
