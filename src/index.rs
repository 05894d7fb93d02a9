//! In-memory retrieval index for one document.
//!
//! A [`RetrievalIndex`] is either **Empty** or **Ready**. [`build`] chunks a
//! document, embeds every chunk, and moves the index to Ready; [`query`]
//! embeds the query text and returns the most similar chunk texts.
//!
//! # Failure policy
//!
//! `build` resets the index to Empty before doing any work. If chunking or
//! embedding fails, the index stays Empty: a failed rebuild never leaves
//! the previous document queryable under the new upload.
//!
//! [`build`]: RetrievalIndex::build
//! [`query`]: RetrievalIndex::query

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::chunk::{chunk_text, Chunk, ChunkingParams};
use crate::embedding::{embed_query, validate_embeddings, EmbeddingClient};
use crate::error::RetrievalError;
use crate::rank::score_top_k;

/// Chunks and their parallel embedding vectors.
///
/// `chunks[i]` is embedded as `vectors[i]`; both always have the same length.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dims: Option<usize>,
    fingerprint: String,
    built_at: DateTime<Utc>,
}

impl IndexedDocument {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}

#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    Empty,
    Ready(IndexedDocument),
}

/// Reporting view of a Ready index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub chunks: usize,
    /// `None` when the document produced no chunks.
    pub dims: Option<usize>,
    /// SHA-256 of the indexed document text.
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
}

/// One ranked chunk returned by [`RetrievalIndex::query_scored`].
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    /// Position of the chunk in the document's chunk sequence.
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    params: ChunkingParams,
    state: IndexState,
}

impl RetrievalIndex {
    /// Create an Empty index that will chunk documents with `params`.
    pub fn new(params: ChunkingParams) -> Self {
        Self {
            params,
            state: IndexState::Empty,
        }
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, IndexState::Ready(_))
    }

    pub fn summary(&self) -> Option<IndexSummary> {
        match &self.state {
            IndexState::Ready(doc) => Some(summarize(doc)),
            IndexState::Empty => None,
        }
    }

    /// Index `text`, replacing whatever the index held before.
    ///
    /// An empty document produces a Ready index with zero chunks and makes
    /// no embedding call.
    pub async fn build(
        &mut self,
        text: &str,
        client: &dyn EmbeddingClient,
    ) -> Result<IndexSummary, RetrievalError> {
        self.state = IndexState::Empty;

        let chunks = chunk_text(text, &self.params)?;
        debug!(chunks = chunks.len(), "document chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = client.embed(&texts).await?;
        let dims = validate_embeddings(client.provider(), texts.len(), &vectors, client.dims())?;

        let doc = IndexedDocument {
            chunks,
            vectors,
            dims,
            fingerprint: fingerprint(text),
            built_at: Utc::now(),
        };
        let summary = summarize(&doc);
        info!(
            chunks = summary.chunks,
            dims = ?summary.dims,
            provider = client.provider(),
            "retrieval index built"
        );

        self.state = IndexState::Ready(doc);
        Ok(summary)
    }

    /// Return the texts of the `k` chunks most similar to `query`.
    pub async fn query(
        &self,
        query: &str,
        k: usize,
        client: &dyn EmbeddingClient,
    ) -> Result<Vec<String>, RetrievalError> {
        let hits = self.query_scored(query, k, client).await?;
        Ok(hits.into_iter().map(|h| h.text).collect())
    }

    /// Like [`query`](Self::query), but keeps chunk positions and scores.
    ///
    /// Skips the embedding call when there is nothing to rank (zero chunks
    /// or `k == 0`).
    pub async fn query_scored(
        &self,
        query: &str,
        k: usize,
        client: &dyn EmbeddingClient,
    ) -> Result<Vec<Hit>, RetrievalError> {
        let doc = match &self.state {
            IndexState::Ready(doc) => doc,
            IndexState::Empty => return Err(RetrievalError::IndexNotReady),
        };

        if doc.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(client, query).await?;
        if let Some(dims) = doc.dims {
            if query_vec.len() != dims {
                return Err(RetrievalError::service(
                    client.provider(),
                    format!(
                        "query embedding has {} values, index has {}",
                        query_vec.len(),
                        dims
                    ),
                ));
            }
        }

        let hits: Vec<Hit> = score_top_k(&query_vec, &doc.vectors, k)
            .into_iter()
            .map(|(i, score)| Hit {
                chunk_index: i,
                score,
                text: doc.chunks[i].text.clone(),
            })
            .collect();
        debug!(k, returned = hits.len(), "retrieval query ranked");

        Ok(hits)
    }
}

/// Join retrieved chunk texts into a single context string, separated by a
/// blank line.
pub fn join_context(chunks: &[String]) -> String {
    chunks.join("\n\n")
}

fn summarize(doc: &IndexedDocument) -> IndexSummary {
    IndexSummary {
        chunks: doc.chunks.len(),
        dims: doc.dims,
        fingerprint: doc.fingerprint.clone(),
        built_at: doc.built_at,
    }
}

fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
