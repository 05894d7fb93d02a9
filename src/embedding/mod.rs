//! Embedding client abstraction and implementations.
//!
//! Defines the [`EmbeddingClient`] trait and concrete implementations:
//! - **[`DisabledClient`]**: fails every non-empty call; used when embeddings are not configured.
//! - **[`RemoteEmbedder`]**: calls a hosted embedding API (Gemini, OpenAI-compatible, or Ollama).
//!
//! # Contract
//!
//! Every implementation returns exactly one vector per input string, in
//! input order. An empty input returns an empty output without touching
//! the network. Each network call is made at most once; retry policy
//! belongs to the caller.
//!
//! # Client Selection
//!
//! Use [`create_embedding_client`] to instantiate the appropriate client
//! from configuration:
//!
//! ```rust,no_run
//! # use quiz_rag::config::EmbeddingConfig;
//! # use quiz_rag::embedding::create_embedding_client;
//! let mut config = EmbeddingConfig::default();
//! config.provider = "disabled".to_string();
//! let client = create_embedding_client(&config).unwrap();
//! assert_eq!(client.model_name(), "disabled");
//! ```

mod remote;

pub use remote::{ProviderKind, RemoteEmbedder};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::RetrievalError;

/// Trait for embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Short provider tag used in logs and errors (e.g. `"gemini"`).
    fn provider(&self) -> &str;
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Expected vector dimensionality, when known up front.
    fn dims(&self) -> Option<usize>;
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`EmbeddingClient::embed`] for query-time use.
pub async fn embed_query(
    client: &dyn EmbeddingClient,
    text: &str,
) -> Result<Vec<f32>, RetrievalError> {
    let vectors = client.embed(&[text.to_string()]).await?;
    let actual = vectors.len();
    vectors
        .into_iter()
        .next()
        .filter(|_| actual == 1)
        .ok_or(RetrievalError::EmbeddingCountMismatch {
            expected: 1,
            actual,
        })
}

/// Check that `vectors` has one entry per input and a single dimensionality.
///
/// `dims` is the dimensionality the vectors must have, if already known.
/// Returns the dimensionality shared by all vectors (or `dims` unchanged
/// when `vectors` is empty).
pub fn validate_embeddings(
    provider: &str,
    expected: usize,
    vectors: &[Vec<f32>],
    dims: Option<usize>,
) -> Result<Option<usize>, RetrievalError> {
    if vectors.len() != expected {
        return Err(RetrievalError::EmbeddingCountMismatch {
            expected,
            actual: vectors.len(),
        });
    }

    let mut dims = dims;
    for (i, v) in vectors.iter().enumerate() {
        if v.is_empty() {
            return Err(RetrievalError::service(
                provider,
                format!("embedding {} is empty", i),
            ));
        }
        match dims {
            Some(d) if d != v.len() => {
                return Err(RetrievalError::service(
                    provider,
                    format!(
                        "dimensionality mismatch: embedding {} has {} values, expected {}",
                        i,
                        v.len(),
                        d
                    ),
                ));
            }
            Some(_) => {}
            None => dims = Some(v.len()),
        }
    }

    Ok(dims)
}

// ============ Disabled Client ============

/// A no-op embedding client that fails every non-empty request.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledClient;

#[async_trait]
impl EmbeddingClient for DisabledClient {
    fn provider(&self) -> &str {
        "disabled"
    }
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Err(RetrievalError::service(
            "disabled",
            "embedding provider is disabled",
        ))
    }
}

/// Create the appropriate [`EmbeddingClient`] based on configuration.
///
/// # Supported Providers
///
/// | Config Value | Client |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledClient`] |
/// | `"gemini"` | [`RemoteEmbedder`] with [`ProviderKind::Gemini`] |
/// | `"openai"` | [`RemoteEmbedder`] with [`ProviderKind::OpenAI`] |
/// | `"ollama"` | [`RemoteEmbedder`] with [`ProviderKind::Ollama`] |
///
/// # Errors
///
/// Returns an error for unknown provider names, a missing model, or a
/// missing API key environment variable.
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    let kind = match config.provider.as_str() {
        "disabled" => return Ok(Box::new(DisabledClient)),
        "gemini" => ProviderKind::Gemini,
        "openai" => ProviderKind::OpenAI,
        "ollama" => ProviderKind::Ollama,
        other => bail!("Unknown embedding provider: {}", other),
    };

    Ok(Box::new(RemoteEmbedder::from_config(kind, config)?))
}
