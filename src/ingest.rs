//! Document ingestion pipeline.
//!
//! Sequential state machine per document:
//! `Received → TextExtracted → Chunked → Embedded → Stored → Complete`,
//! failing from any state. No partial-complete state is persisted; a
//! failure means the caller restarts from `Received`. Failures carry the
//! stage reached and partial counts so the caller can report progress.
//!
//! Re-ingestion policy: existing vectors for the document are always
//! deleted before the new upsert, so changed chunk boundaries cannot
//! leave stale chunks behind. Concurrent re-ingestion of the same
//! document is last-writer-wins; the external services offer no
//! transaction spanning delete+upsert.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::{EngineError, IngestFailure};
use crate::extract::{extract_text, DocumentFormat};
use crate::index::{vector_id, VectorIndex};
use crate::models::{
    truncate_chars, IngestState, IngestionResult, VectorMetadata, VectorRecord,
    EXCERPT_METADATA_CHARS,
};
use crate::objects::ObjectStore;

/// Deterministic document id from (owner, display name), so re-ingesting
/// the same document targets the same vector ids.
pub fn document_id(owner_id: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest)[..32].to_string()
}

/// Derive a display name from a reference: last path segment, query
/// string stripped.
pub fn display_name_from_reference(reference: &str) -> String {
    reference
        .rsplit('/')
        .next()
        .unwrap_or(reference)
        .split('?')
        .next()
        .unwrap_or(reference)
        .to_string()
}

/// Run the full ingestion pipeline for one document.
pub async fn run_ingest(
    objects: &dyn ObjectStore,
    embedder: &dyn EmbeddingClient,
    index: &dyn VectorIndex,
    config: &Config,
    owner_id: &str,
    reference: &str,
    name: Option<&str>,
) -> Result<IngestionResult, IngestFailure> {
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| display_name_from_reference(reference));
    let doc_id = document_id(owner_id, &name);

    info!(owner_id, document = %name, state = ?IngestState::Received, "ingestion started");

    let bytes = objects.download(reference).await.map_err(|e| {
        warn!(owner_id, document = %name, error = %e, "document download failed");
        IngestFailure::at(IngestState::Received, EngineError::StorageUnavailable)
    })?;

    let format = DocumentFormat::from_name(&name)
        .map_err(|e| IngestFailure::at(IngestState::Received, e))?;
    let text = extract_text(&bytes, format, config.limits.max_document_bytes)
        .map_err(|e| IngestFailure::at(IngestState::Received, e))?;
    info!(
        owner_id,
        document = %name,
        chars = text.chars().count(),
        state = ?IngestState::TextExtracted,
        "text extracted"
    );

    let chunks = chunk_text(
        &doc_id,
        &text,
        config.chunking.chunk_size,
        config.chunking.overlap,
    );
    let chunks_created = chunks.len();
    info!(owner_id, document = %name, chunks = chunks_created, state = ?IngestState::Chunked, "text chunked");

    // Embed in batches, tracking how far we got for failure reporting.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks_created);
    for batch in chunks.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match embedder.embed(&texts).await {
            Ok(batch_vectors) => vectors.extend(batch_vectors),
            Err(source) => {
                warn!(
                    owner_id,
                    document = %name,
                    embedded = vectors.len(),
                    total = chunks_created,
                    "embedding failed mid-document"
                );
                return Err(IngestFailure {
                    failed_at: IngestState::Chunked,
                    chunks_created,
                    chunks_embedded: vectors.len(),
                    vectors_stored: 0,
                    source,
                });
            }
        }
    }
    info!(owner_id, document = %name, state = ?IngestState::Embedded, "chunks embedded");

    let ingested_at = Utc::now();
    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: vector_id(owner_id, &doc_id, chunk.index),
            owner_id: owner_id.to_string(),
            values,
            metadata: VectorMetadata {
                document_id: doc_id.clone(),
                document_name: name.clone(),
                chunk_index: chunk.index,
                excerpt: truncate_chars(&chunk.text, EXCERPT_METADATA_CHARS),
                total_chunks: chunks_created,
                ingested_at,
            },
        })
        .collect();

    // Purge any previous version of this document first. Deterministic ids
    // already make unchanged-boundary re-ingestion idempotent; the purge
    // covers changed boundaries, which would otherwise orphan old chunks.
    index.delete_document(owner_id, &doc_id).await.map_err(|source| IngestFailure {
        failed_at: IngestState::Embedded,
        chunks_created,
        chunks_embedded: chunks_created,
        vectors_stored: 0,
        source,
    })?;

    let report = index
        .upsert(owner_id, &records)
        .await
        .map_err(|source| IngestFailure {
            failed_at: IngestState::Embedded,
            chunks_created,
            chunks_embedded: chunks_created,
            vectors_stored: 0,
            source,
        })?;

    if !report.failed_ids.is_empty() {
        warn!(
            owner_id,
            document = %name,
            stored = report.upserted,
            failed = report.failed_ids.len(),
            "partial vector upsert"
        );
        return Err(IngestFailure {
            failed_at: IngestState::Embedded,
            chunks_created,
            chunks_embedded: chunks_created,
            vectors_stored: report.upserted,
            source: EngineError::IndexUnavailable,
        });
    }

    info!(
        owner_id,
        document = %name,
        vectors = report.upserted,
        state = ?IngestState::Complete,
        "ingestion complete"
    );

    Ok(IngestionResult {
        document_id: doc_id,
        document_name: name,
        chunks_created,
        vectors_stored: report.upserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_stable_per_owner_and_name() {
        let a = document_id("u1", "notes.pdf");
        assert_eq!(a, document_id("u1", "notes.pdf"));
        assert_ne!(a, document_id("u2", "notes.pdf"));
        assert_ne!(a, document_id("u1", "other.pdf"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn display_name_strips_path_and_query() {
        assert_eq!(
            display_name_from_reference("https://store/bucket/lecture.pdf?token=abc"),
            "lecture.pdf"
        );
        assert_eq!(display_name_from_reference("notes.txt"), "notes.txt");
    }
}
