//! # Quiz RAG
//!
//! In-memory retrieval pipeline for generating quiz questions from an
//! uploaded document.
//!
//! A document is split into overlapping chunks, each chunk is embedded by a
//! remote embedding service, and the resulting vectors are held in a
//! per-session index. Queries are embedded the same way and answered with
//! the chunks whose vectors are most similar by cosine similarity. The
//! joined chunk texts become the context for a generation prompt, and the
//! model's reply is parsed back into structured questions or feedback.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │ Document │──▶│  Chunker  │──▶│  Embedding  │
//! │  (text)  │   │ recursive │   │   client    │
//! └──────────┘   └───────────┘   └──────┬──────┘
//!                                       ▼
//!                ┌───────────┐   ┌─────────────┐
//!   query ──────▶│  Ranker   │◀──│ Retrieval   │
//!                │  cosine   │   │ index (per  │
//!                └─────┬─────┘   │  session)   │
//!                      ▼         └─────────────┘
//!                top-k chunk texts ──▶ generation ──▶ response parser
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! quiz-rag chunk notes.txt --chunk-size 1500 --overlap 200
//! quiz-rag query notes.txt "photosynthesis" -k 5
//! quiz-rag parse reply.txt --kind mcq
//! quiz-rag stats result.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Retrieval, generation, and response errors |
//! | [`chunk`] | Recursive text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`rank`] | Cosine similarity and top-k ranking |
//! | [`index`] | Per-document retrieval index |
//! | [`session`] | Per-session index registry |
//! | [`generate`] | Text-generation client |
//! | [`response`] | Parsing model replies into questions and feedback |
//! | [`quiz`] | Quiz results and statistics |
//! | [`logging`] | Tracing subscriber setup |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod logging;
pub mod quiz;
pub mod rank;
pub mod response;
pub mod session;

#[cfg(test)]
mod test_support;
