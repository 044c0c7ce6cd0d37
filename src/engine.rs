//! Engine facade: owns the external-service clients and exposes the two
//! pipelines plus the small management operations around them.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::ask::run_ask;
use crate::config::{self, Config};
use crate::db;
use crate::embedding::{EmbeddingClient, HttpEmbedder};
use crate::error::{EngineError, IngestFailure};
use crate::generation::{GenerationClient, HttpGenerator};
use crate::history::{ConversationStore, SqliteHistory};
use crate::index::{HttpVectorIndex, VectorIndex};
use crate::ingest::{document_id, run_ingest};
use crate::models::{AnswerResult, AskOptions, ConversationTurn, IngestionResult};
use crate::objects::ObjectStore;

pub struct Engine {
    objects: Arc<dyn ObjectStore>,
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn GenerationClient>,
    history: Arc<dyn ConversationStore>,
    config: Config,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Assemble an engine from explicit parts. This is the seam the tests
    /// and any embedding application use; [`Engine::from_config`] is the
    /// production wiring.
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn GenerationClient>,
        history: Arc<dyn ConversationStore>,
        config: Config,
    ) -> Result<Self, EngineError> {
        // Config errors are startup errors: a bad chunking or generation
        // setting must never surface mid-request.
        config::validate(&config).map_err(|e| match e.downcast::<EngineError>() {
            Ok(err) => err,
            Err(other) => EngineError::InvalidConfig(other.to_string()),
        })?;

        // The dimensionality contract is checked once, up front. A process
        // that would write vectors the index cannot hold must not start.
        if embedder.dims() != config.index.dims {
            return Err(EngineError::DimensionMismatch {
                embedding: embedder.dims(),
                index: config.index.dims,
            });
        }

        Ok(Self {
            objects,
            embedder,
            index,
            generator,
            history,
            config,
        })
    }

    /// Wire up the production clients: HTTP embedding/index/generation
    /// services and the SQLite conversation store.
    pub async fn from_config(objects: Arc<dyn ObjectStore>, config: Config) -> Result<Self> {
        let embedder = HttpEmbedder::new(&config.embedding)?;
        let index = HttpVectorIndex::new(&config.index)?;
        let generator = HttpGenerator::new(&config.generation)?;

        let pool = db::connect(&config.db.path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db.path.display()))?;
        db::run_migrations(&pool).await?;

        Ok(Self::new(
            objects,
            Arc::new(embedder),
            Arc::new(index),
            Arc::new(generator),
            Arc::new(SqliteHistory::new(pool)),
            config,
        )?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest one document for `owner_id`. Re-ingesting the same name
    /// replaces the previous version.
    pub async fn ingest(
        &self,
        owner_id: &str,
        reference: &str,
        name: Option<&str>,
    ) -> Result<IngestionResult, IngestFailure> {
        run_ingest(
            self.objects.as_ref(),
            self.embedder.as_ref(),
            self.index.as_ref(),
            &self.config,
            owner_id,
            reference,
            name,
        )
        .await
    }

    /// Answer a question against `owner_id`'s documents.
    pub async fn ask(
        &self,
        owner_id: &str,
        question: &str,
        options: AskOptions,
    ) -> Result<AnswerResult, EngineError> {
        run_ask(
            self.embedder.as_ref(),
            self.index.as_ref(),
            self.generator.as_ref(),
            self.history.as_ref(),
            &self.config,
            owner_id,
            question,
            options,
        )
        .await
    }

    /// Remove every vector of the named document.
    pub async fn delete_document(&self, owner_id: &str, name: &str) -> Result<(), EngineError> {
        let doc_id = document_id(owner_id, name);
        self.index.delete_document(owner_id, &doc_id).await
    }

    /// The newest `limit` turns of `owner_id`'s conversation log, oldest
    /// first.
    pub async fn history(&self, owner_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        self.history.list_recent(owner_id, limit).await
    }

    /// Delete the whole conversation log for `owner_id`; returns the
    /// number of turns removed.
    pub async fn clear_history(&self, owner_id: &str) -> Result<u64> {
        self.history.delete_all(owner_id).await
    }

    /// Delete a single turn, verifying ownership; false if no such turn.
    pub async fn delete_turn(&self, owner_id: &str, turn_id: &str) -> Result<bool> {
        self.history.delete_turn(owner_id, turn_id).await
    }
}
