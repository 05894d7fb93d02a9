//! Error types for the retrieval pipeline and the model-output layer.
//!
//! Library operations return these typed errors; the CLI wraps them in
//! `anyhow` at the command boundary.

use thiserror::Error;

/// Failures raised by the chunker, the embedding client, and the
/// retrieval index.
///
/// An empty candidate set is deliberately absent: querying an index built
/// from an empty document yields `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid chunking configuration (e.g. overlap not smaller than the chunk size).
    #[error("Chunking error: {message}")]
    Chunking { message: String },

    /// Transport, HTTP status, timeout, or response-parse failure.
    #[error("Embedding service failure ({provider}): {message}")]
    EmbeddingServiceFailure { provider: String, message: String },

    /// The service returned a different number of vectors than texts sent.
    #[error("Embedding count mismatch: expected {expected} vectors, got {actual}")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    /// `query` was called before a successful `build`.
    #[error("Retrieval index is not ready: build it from a document first")]
    IndexNotReady,
}

impl RetrievalError {
    pub(crate) fn service(provider: &str, message: impl Into<String>) -> Self {
        RetrievalError::EmbeddingServiceFailure {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Failures raised by the text-generation client.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation service failure ({provider}): {message}")]
    ServiceFailure { provider: String, message: String },

    #[error("Generation service returned no text")]
    EmptyResponse,
}

/// Failures raised while parsing raw model output into structured data.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("Model output contains no JSON object")]
    NoJsonObject,

    #[error("Model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Model output has an unexpected shape: {0}")]
    UnexpectedShape(String),
}
