//! Prompt assembly for the answer pipeline.
//!
//! The prompt has a fixed section order that is part of the output
//! contract: system instructions, then recent history oldest-first (so
//! pronouns in the new question resolve against it), then retrieved
//! passages tagged with citation indices, then the current question.
//! [`Prompt`] keeps the sections inspectable so tests can assert the
//! structure without invoking a model.

use crate::models::{truncate_chars, ConversationTurn, ScoredVector};

/// Instructions sent as the system message.
pub const SYSTEM_INSTRUCTIONS: &str = "You are a helpful study assistant. Answer questions using \
only the provided context passages, citing them by their [n] index. If the context does not \
contain the answer, say so clearly.";

/// Marker inserted in place of passages when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str =
    "(no relevant passages were found in the user's documents)";

/// History answers longer than this are truncated when rendered.
const HISTORY_ANSWER_CHARS: usize = 200;

/// One prior exchange rendered into the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
}

/// One retrieved passage with its citation tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// 1-based citation index, referenced as `[n]` in answers.
    pub citation: usize,
    pub document_name: String,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
}

/// An assembled, inspectable prompt.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: &'static str,
    /// Oldest first.
    pub history: Vec<HistoryEntry>,
    /// Descending relevance, citation indices contiguous from 1.
    pub passages: Vec<Passage>,
    pub query: String,
}

impl Prompt {
    /// Assemble a prompt from retrieved context and recent history.
    ///
    /// `turns` must already be in chronological order (oldest first), as
    /// returned by the conversation store. `hits` must be in descending
    /// score order, as returned by the vector index.
    pub fn assemble(turns: &[ConversationTurn], hits: &[ScoredVector], query: &str) -> Self {
        let history = turns
            .iter()
            .map(|turn| HistoryEntry {
                question: turn.question.clone(),
                answer: truncate_chars(&turn.answer, HISTORY_ANSWER_CHARS),
            })
            .collect();

        let passages = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| Passage {
                citation: i + 1,
                document_name: hit.metadata.document_name.clone(),
                chunk_index: hit.metadata.chunk_index,
                score: hit.score,
                text: hit.metadata.excerpt.clone(),
            })
            .collect();

        Self {
            system: SYSTEM_INSTRUCTIONS,
            history,
            passages,
            query: query.to_string(),
        }
    }

    /// Render everything after the system message as a single user message,
    /// preserving the fixed section order.
    pub fn render_user_message(&self) -> String {
        let mut out = String::new();

        if !self.history.is_empty() {
            out.push_str("Previous conversation:\n");
            for entry in &self.history {
                out.push_str(&format!("User asked: {}\n", entry.question));
                out.push_str(&format!("Assistant answered: {}\n", entry.answer));
            }
            out.push('\n');
        }

        out.push_str("Context:\n");
        if self.passages.is_empty() {
            out.push_str(NO_CONTEXT_MARKER);
            out.push('\n');
        } else {
            for passage in &self.passages {
                out.push_str(&format!(
                    "[{}] (Source: {}, chunk {}, relevance: {:.2})\n{}\n\n",
                    passage.citation,
                    passage.document_name,
                    passage.chunk_index,
                    passage.score,
                    passage.text
                ));
            }
        }

        out.push_str(&format!("\nQuestion: {}\n", self.query));
        out.push_str("Provide a clear, concise answer based on the context above.");
        out
    }
}
