//! # Quiz RAG CLI (`quiz-rag`)
//!
//! Command-line front end for the retrieval pipeline. Useful for inspecting
//! how a document is chunked, what a query retrieves, and whether a model
//! reply parses.
//!
//! ## Usage
//!
//! ```bash
//! quiz-rag --config ./config/quiz.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quiz-rag chunk <file>` | Print the chunk boundaries of a text file |
//! | `quiz-rag query <file> "<query>"` | Index a file in a fresh session and print the top-k chunks |
//! | `quiz-rag parse <file> --kind mcq` | Parse a saved model reply into JSON |
//! | `quiz-rag stats <result.json>` | Summarize a graded quiz result |
//!
//! `chunk`, `parse` and `stats` never touch the network and run with the
//! default configuration when the config file does not exist.
//!
//! Text generation is library-only: the binary validates the `[generation]`
//! section with the rest of the file but never creates a
//! [`GenerationClient`](quiz_rag::generate::GenerationClient). `parse`
//! works on replies saved from a generation call.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::debug;

use quiz_rag::chunk::{chunk_text, ChunkingParams};
use quiz_rag::config::{self, Config};
use quiz_rag::embedding::create_embedding_client;
use quiz_rag::logging::init_logging;
use quiz_rag::quiz::{load_result, QuizStats};
use quiz_rag::response::{parse_feedback, parse_mcq_set};
use quiz_rag::session::SessionRegistry;

/// Quiz RAG CLI: chunk, index, and query documents for quiz generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/quiz.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "quiz-rag",
    about = "In-memory retrieval pipeline for generating quiz questions from documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/quiz.toml")]
    config: PathBuf,

    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` wins if set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a UTF-8 text file into chunks and print their boundaries.
    Chunk {
        file: PathBuf,

        /// Maximum chunk length in characters. Defaults to `chunking.chunk_size`.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks. Defaults to `chunking.overlap`.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Index a text file in a new session and print the chunks most similar
    /// to the query.
    ///
    /// Requires an embedding provider to be configured.
    Query {
        file: PathBuf,

        query: String,

        /// Number of chunks to return. Defaults to `retrieval.top_k`.
        #[arg(short)]
        k: Option<usize>,
    },

    /// Parse a saved model reply and print it as JSON.
    Parse {
        file: PathBuf,

        #[arg(long, value_enum)]
        kind: ReplyKind,
    },

    /// Print accuracy statistics for a graded quiz result (JSON).
    Stats { result: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReplyKind {
    Mcq,
    Feedback,
}

/// Load the config file, or fall back to defaults when it does not exist.
fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
        } => {
            let cfg = load_or_default(&cli.config)?;
            let params = ChunkingParams::new(
                chunk_size.unwrap_or(cfg.chunking.chunk_size),
                overlap.unwrap_or(cfg.chunking.overlap),
            );
            let text = read_text(&file)?;
            let chunks = chunk_text(&text, &params)?;

            for chunk in &chunks {
                println!(
                    "[{}] {}..{} ({} chars)",
                    chunk.index,
                    chunk.start,
                    chunk.end(),
                    chunk.char_len()
                );
            }
            println!("{} chunks", chunks.len());
        }
        Commands::Query { file, query, k } => {
            let cfg = config::load_config(&cli.config)?;
            let client = create_embedding_client(&cfg.embedding)?;
            let k = k.unwrap_or(cfg.retrieval.top_k);
            let text = read_text(&file)?;

            let registry = SessionRegistry::new(ChunkingParams::from(&cfg.chunking));
            let id = registry.open().await;
            let handle = registry
                .get(id)
                .await
                .context("session disappeared after opening")?;

            let hits = {
                let mut session = handle.lock().await;
                let summary = session.index.build(&text, client.as_ref()).await?;
                println!(
                    "Indexed {} chunks with {} ({})",
                    summary.chunks,
                    client.model_name(),
                    client.provider()
                );
                session.index.query_scored(&query, k, client.as_ref()).await?
            };
            registry.end(id).await;

            if hits.is_empty() {
                println!("No results.");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "\n#{} chunk {} (score {:.4})\n{}",
                    rank + 1,
                    hit.chunk_index,
                    hit.score,
                    hit.text
                );
            }
        }
        Commands::Parse { file, kind } => {
            load_or_default(&cli.config)?;
            let reply = read_text(&file)?;
            let json = match kind {
                ReplyKind::Mcq => serde_json::to_string_pretty(&parse_mcq_set(&reply)?)?,
                ReplyKind::Feedback => serde_json::to_string_pretty(&parse_feedback(&reply)?)?,
            };
            println!("{}", json);
        }
        Commands::Stats { result } => {
            load_or_default(&cli.config)?;
            let result = load_result(&result)?;
            let stats = QuizStats::from_result(&result);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
