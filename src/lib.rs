//! # Lectern
//!
//! A retrieval-augmented question answering engine over per-user document
//! collections. Documents are ingested into an owner-scoped vector index
//! (extract → chunk → embed → store); questions are answered by
//! retrieving the owner's most relevant chunks, folding in recent
//! conversation history, and prompting a generation model with the
//! assembled context.
//!
//! The external services (embedding, vector index, generation, object
//! storage, conversation store) sit behind traits; [`memory`] provides
//! in-memory implementations so the whole engine runs offline in tests.

pub mod ask;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod history;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod models;
pub mod objects;
pub mod prompt;

pub use engine::Engine;
pub use error::{EngineError, IngestFailure};
pub use models::{AnswerResult, AskOptions, IngestionResult};
