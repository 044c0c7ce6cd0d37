//! Conversation store: an append-only per-owner Q&A log read by a
//! sliding window (always the N most recent turns, never random access).

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{ConversationTurn, Reference};

/// Append/read/delete operations over a user's conversation log.
///
/// `list_recent` returns the newest `limit` turns in chronological order
/// (oldest first), ready to be rendered into a prompt.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, turn: &ConversationTurn) -> anyhow::Result<()>;

    async fn list_recent(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ConversationTurn>>;

    async fn delete_all(&self, owner_id: &str) -> anyhow::Result<u64>;

    /// Delete one turn, verifying ownership.
    async fn delete_turn(&self, owner_id: &str, turn_id: &str) -> anyhow::Result<bool>;
}

/// Build a new turn with a fresh id and timestamp.
pub fn new_turn(
    owner_id: &str,
    question: &str,
    answer: &str,
    references: Vec<Reference>,
) -> ConversationTurn {
    ConversationTurn {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        references,
        created_at: Utc::now(),
    }
}

/// SQLite-backed conversation store.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqliteHistory {
    async fn append(&self, turn: &ConversationTurn) -> anyhow::Result<()> {
        let references_json = serde_json::to_string(&turn.references)?;
        sqlx::query(
            r#"
            INSERT INTO turns (id, owner_id, question, answer, references_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.owner_id)
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(&references_json)
        .bind(turn.created_at.timestamp_micros())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recent(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ConversationTurn>> {
        // Newest N first, then reversed into chronological order.
        let rows: Vec<(String, String, String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, owner_id, question, answer, references_json, created_at
            FROM turns
            WHERE owner_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns: Vec<ConversationTurn> = rows
            .into_iter()
            .map(|(id, owner_id, question, answer, references_json, created_at)| {
                ConversationTurn {
                    id,
                    owner_id,
                    question,
                    answer,
                    references: serde_json::from_str(&references_json).unwrap_or_default(),
                    created_at: chrono::DateTime::from_timestamp_micros(created_at)
                        .unwrap_or_else(Utc::now),
                }
            })
            .collect();
        turns.reverse();
        Ok(turns)
    }

    async fn delete_all(&self, owner_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM turns WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_turn(&self, owner_id: &str, turn_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM turns WHERE id = ? AND owner_id = ?")
            .bind(turn_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
