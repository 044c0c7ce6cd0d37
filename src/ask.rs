//! Answer pipeline: embed the question, retrieve owner-scoped context,
//! assemble the prompt, generate, and persist the turn.
//!
//! Degradation policy, from least to most tolerant:
//! - query embedding or vector search failing aborts the request
//!   (`RetrievalUnavailable`) — answering without retrieval would silently
//!   drop the grounding the user ingested documents for;
//! - history being unreadable is non-fatal, the prompt just loses its
//!   conversation section;
//! - generation failing yields a fixed fallback answer alongside the
//!   retrieved references, so the user still sees what was found;
//! - turn persistence is best-effort: a write failure is logged and never
//!   affects the response.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::EngineError;
use crate::generation::{GenerationClient, GenerationParams};
use crate::history::{new_turn, ConversationStore};
use crate::index::VectorIndex;
use crate::models::{AnswerResult, AskOptions, Reference};
use crate::prompt::Prompt;

/// Answer returned when generation fails after retrieval succeeded.
pub const FALLBACK_ANSWER: &str =
    "I found relevant passages in your documents but could not generate an answer right now. \
Please try again in a moment.";

/// Run the full answer pipeline for one question.
pub async fn run_ask(
    embedder: &dyn EmbeddingClient,
    index: &dyn VectorIndex,
    generator: &dyn GenerationClient,
    history: &dyn ConversationStore,
    config: &Config,
    owner_id: &str,
    question: &str,
    options: AskOptions,
) -> Result<AnswerResult, EngineError> {
    let question = question.trim();

    let query_vector = embedder
        .embed(&[question.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or(EngineError::RetrievalUnavailable)?;

    let top_k = options.top_k.unwrap_or(config.answer.top_k).max(1);
    let hits = index
        .query(owner_id, &query_vector, top_k)
        .await
        .map_err(|e| {
            warn!(owner_id, error = %e, "vector search failed");
            EngineError::RetrievalUnavailable
        })?;
    debug!(owner_id, hits = hits.len(), top_k, "context retrieved");

    // A history read failure degrades the prompt, never the answer.
    let turns = match history
        .list_recent(owner_id, config.answer.history_turns)
        .await
    {
        Ok(turns) => turns,
        Err(e) => {
            warn!(owner_id, error = %e, "conversation history unavailable, continuing without it");
            Vec::new()
        }
    };

    let prompt = Prompt::assemble(&turns, &hits, question);
    let params = GenerationParams::bounded(
        options
            .max_tokens
            .unwrap_or(config.generation.default_max_tokens),
        options
            .temperature
            .unwrap_or(config.generation.default_temperature),
    );

    let references: Vec<Reference> = hits.iter().map(Reference::from_hit).collect();

    let answer = match generator.generate(&prompt, params).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(owner_id, error = %e, "generation failed, returning fallback answer");
            FALLBACK_ANSWER.to_string()
        }
    };

    // Best-effort: a write failure only costs this turn's history entry.
    // The append is awaited so the write lands before the caller can exit
    // the runtime.
    let turn = new_turn(owner_id, question, &answer, references.clone());
    if let Err(e) = history.append(&turn).await {
        warn!(owner_id, error = %e, "failed to persist conversation turn");
    }

    info!(
        owner_id,
        references = references.len(),
        answer_chars = answer.chars().count(),
        "question answered"
    );
    Ok(AnswerResult { answer, references })
}
