//! # Lectern CLI (`lectern`)
//!
//! Command-line interface for the Lectern question-answering engine.
//!
//! ## Usage
//!
//! ```bash
//! lectern --config ./config/lectern.toml --owner <user> <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lectern init` | Create the SQLite database and run schema migrations |
//! | `lectern ingest <file>` | Ingest a PDF or plain-text document |
//! | `lectern ask "<question>"` | Answer a question from the owner's documents |
//! | `lectern delete <name>` | Remove a document's vectors from the index |
//! | `lectern history list` | Show recent conversation turns |
//! | `lectern history clear` | Delete the owner's conversation log |
//! | `lectern history forget <id>` | Delete a single turn by id |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use lectern::config::load_config;
use lectern::models::AskOptions;
use lectern::objects::FsObjectStore;
use lectern::{db, Engine};

/// Lectern — retrieval-augmented question answering over your documents.
///
/// All commands read settings from a TOML configuration file given via
/// `--config`. API keys are taken from the environment:
/// `LECTERN_EMBED_API_KEY`, `LECTERN_INDEX_API_KEY`,
/// `LECTERN_GENERATION_API_KEY`.
#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Retrieval-augmented question answering over per-user document collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lectern.toml")]
    config: PathBuf,

    /// Owner id all operations are scoped to.
    #[arg(long, global = true, default_value = "default")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the conversation database schema. Idempotent.
    Init,

    /// Ingest a document (PDF, .txt, or .md) into the owner's index.
    ///
    /// Re-ingesting a file with the same name replaces the previous
    /// version.
    Ingest {
        /// Path to the document file.
        file: PathBuf,

        /// Display name used in citations; defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask a question against the owner's ingested documents.
    Ask {
        /// The question text.
        question: String,

        /// Number of passages to retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Maximum tokens to generate (clamped to [50, 1024]).
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature (clamped to [0.0, 1.0]).
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Delete a document's vectors from the index.
    Delete {
        /// Display name the document was ingested under.
        name: String,
    },

    /// Inspect or prune the conversation log.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Show the most recent turns, oldest first.
    List {
        /// Number of turns to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete the owner's entire conversation log.
    Clear,
    /// Delete a single turn by its id.
    Forget {
        /// Turn id as printed by `history list`.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,lectern=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        let pool = db::connect(&config.db.path).await?;
        db::run_migrations(&pool).await?;
        println!("Database initialized at {}", config.db.path.display());
        return Ok(());
    }

    let engine = Engine::from_config(Arc::new(FsObjectStore), config).await?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Ingest { file, name } => {
            let reference = file.to_string_lossy().to_string();
            let result = engine
                .ingest(&cli.owner, &reference, name.as_deref())
                .await?;
            println!(
                "Ingested '{}': {} chunks, {} vectors stored (document id {})",
                result.document_name,
                result.chunks_created,
                result.vectors_stored,
                result.document_id
            );
        }
        Commands::Ask {
            question,
            top_k,
            max_tokens,
            temperature,
        } => {
            let options = AskOptions {
                top_k,
                max_tokens,
                temperature,
            };
            let result = engine.ask(&cli.owner, &question, options).await?;
            println!("{}\n", result.answer);
            for (i, reference) in result.references.iter().enumerate() {
                println!(
                    "[{}] (Source: {}, chunk {}, relevance: {:.2})",
                    i + 1,
                    reference.document_name,
                    reference.chunk_index,
                    reference.score
                );
            }
        }
        Commands::Delete { name } => {
            engine.delete_document(&cli.owner, &name).await?;
            println!("Deleted '{name}' from the index.");
        }
        Commands::History { action } => match action {
            HistoryAction::List { limit } => {
                let turns = engine.history(&cli.owner, limit).await?;
                if turns.is_empty() {
                    println!("No conversation history.");
                }
                for turn in turns {
                    println!(
                        "{} [{}]\n  Q: {}\n  A: {}",
                        turn.created_at.format("%Y-%m-%d %H:%M:%S"),
                        turn.id,
                        turn.question,
                        turn.answer
                    );
                }
            }
            HistoryAction::Clear => {
                let deleted = engine.clear_history(&cli.owner).await?;
                println!("Deleted {deleted} turns.");
            }
            HistoryAction::Forget { id } => {
                if engine.delete_turn(&cli.owner, &id).await? {
                    println!("Turn {id} deleted.");
                } else {
                    println!("No turn {id} found for this owner.");
                }
            }
        },
    }

    Ok(())
}
