//! In-memory implementations of the external-service traits.
//!
//! These are the test seam promised by the client abstractions: a
//! brute-force cosine vector index partitioned by owner, a Vec-backed
//! conversation store, and a map-backed object store. They also make the
//! engine runnable fully offline.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::EngineError;
use crate::history::ConversationStore;
use crate::index::{UpsertReport, VectorIndex};
use crate::models::{ConversationTurn, ScoredVector, VectorMetadata, VectorRecord};
use crate::objects::ObjectStore;

struct StoredVector {
    owner_id: String,
    values: Vec<f32>,
    metadata: VectorMetadata,
}

/// Brute-force in-memory vector index, partitioned by owner id and
/// idempotent by vector id.
#[derive(Default)]
pub struct MemoryVectorIndex {
    vectors: RwLock<HashMap<String, StoredVector>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(
        &self,
        _owner_id: &str,
        records: &[VectorRecord],
    ) -> Result<UpsertReport, EngineError> {
        let mut vectors = self.vectors.write().unwrap();
        for record in records {
            vectors.insert(
                record.id.clone(),
                StoredVector {
                    owner_id: record.owner_id.clone(),
                    values: record.values.clone(),
                    metadata: record.metadata.clone(),
                },
            );
        }
        Ok(UpsertReport {
            upserted: records.len(),
            failed_ids: Vec::new(),
        })
    }

    async fn query(
        &self,
        owner_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredVector>, EngineError> {
        let vectors = self.vectors.read().unwrap();
        let mut hits: Vec<ScoredVector> = vectors
            .iter()
            .filter(|(_, stored)| stored.owner_id == owner_id)
            .map(|(id, stored)| ScoredVector {
                id: id.clone(),
                score: cosine_similarity(vector, &stored.values),
                metadata: stored.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_document(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> Result<(), EngineError> {
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|_, stored| {
            !(stored.owner_id == owner_id && stored.metadata.document_id == document_id)
        });
        Ok(())
    }
}

/// Vec-backed conversation store.
#[derive(Default)]
pub struct MemoryHistory {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryHistory {
    async fn append(&self, turn: &ConversationTurn) -> anyhow::Result<()> {
        self.turns.write().unwrap().push(turn.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ConversationTurn>> {
        let turns = self.turns.read().unwrap();
        let mut owned: Vec<ConversationTurn> = turns
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|t| t.created_at);
        let skip = owned.len().saturating_sub(limit);
        Ok(owned.split_off(skip))
    }

    async fn delete_all(&self, owner_id: &str) -> anyhow::Result<u64> {
        let mut turns = self.turns.write().unwrap();
        let before = turns.len();
        turns.retain(|t| t.owner_id != owner_id);
        Ok((before - turns.len()) as u64)
    }

    async fn delete_turn(&self, owner_id: &str, turn_id: &str) -> anyhow::Result<bool> {
        let mut turns = self.turns.write().unwrap();
        let before = turns.len();
        turns.retain(|t| !(t.owner_id == owner_id && t.id == turn_id));
        Ok(turns.len() < before)
    }
}

/// Map-backed object store for tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, reference: &str, bytes: Vec<u8>) {
        self.objects
            .write()
            .unwrap()
            .insert(reference.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(&self, reference: &str) -> anyhow::Result<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no object for reference: {reference}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, owner: &str, doc: &str, values: Vec<f32>, excerpt: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            values,
            metadata: VectorMetadata {
                document_id: doc.to_string(),
                document_name: format!("{doc}.txt"),
                chunk_index: 0,
                excerpt: excerpt.to_string(),
                total_chunks: 1,
                ingested_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn query_never_crosses_owners() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("a", &[record("va", "a", "d1", vec![1.0, 0.0], "alpha")])
            .await
            .unwrap();
        index
            .upsert("b", &[record("vb", "b", "d2", vec![1.0, 0.0], "bravo")])
            .await
            .unwrap();

        // Owner B's vector is a perfect match for the query; it still must
        // not appear in owner A's results.
        let hits = index.query("a", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "va");
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("a", &[record("v1", "a", "d1", vec![1.0, 0.0], "old")])
            .await
            .unwrap();
        index
            .upsert("a", &[record("v1", "a", "d1", vec![0.0, 1.0], "new")])
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        let hits = index.query("a", &[0.0, 1.0], 10).await.unwrap();
        assert_eq!(hits[0].metadata.excerpt, "new");
    }

    #[tokio::test]
    async fn scores_non_increasing() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                "a",
                &[
                    record("v1", "a", "d1", vec![1.0, 0.0], "close"),
                    record("v2", "a", "d1", vec![0.7, 0.7], "middle"),
                    record("v3", "a", "d1", vec![0.0, 1.0], "far"),
                ],
            )
            .await
            .unwrap();

        let hits = index.query("a", &[1.0, 0.0], 3).await.unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(hits[0].metadata.excerpt, "close");
    }

    #[tokio::test]
    async fn delete_document_scoped_to_owner_and_document() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("a", &[record("v1", "a", "d1", vec![1.0], "x")])
            .await
            .unwrap();
        index
            .upsert("a", &[record("v2", "a", "d2", vec![1.0], "y")])
            .await
            .unwrap();
        index
            .upsert("b", &[record("v3", "b", "d1", vec![1.0], "z")])
            .await
            .unwrap();

        index.delete_document("a", "d1").await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.query("a", &[1.0], 10).await.unwrap().len() == 1);
        assert!(index.query("b", &[1.0], 10).await.unwrap().len() == 1);
    }
}
