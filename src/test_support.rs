//! Shared helpers for unit tests: an in-process HTTP mock and a
//! deterministic embedding client.

use async_trait::async_trait;
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::{validate_embeddings, EmbeddingClient};
use crate::error::RetrievalError;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Embedding client answering from a fixed text → vector table.
///
/// Unknown texts embed to `fallback`. `short_by` drops that many vectors
/// from every reply to simulate a misbehaving service.
pub struct StaticEmbedder {
    table: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    short_by: usize,
    pub calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)], fallback: Vec<f32>) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(t, v)| (t.to_string(), v.clone()))
                .collect(),
            fallback,
            short_by: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn short_by(mut self, n: usize) -> Self {
        self.short_by = n;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Vector this client returns for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        self.table.get(text).cloned().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl EmbeddingClient for StaticEmbedder {
    fn provider(&self) -> &str {
        "static"
    }
    fn model_name(&self) -> &str {
        "static"
    }
    fn dims(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let keep = texts.len().saturating_sub(self.short_by);
        let vectors: Vec<Vec<f32>> = texts
            .iter()
            .take(keep)
            .map(|t| self.vector_for(t))
            .collect();
        if self.short_by == 0 {
            validate_embeddings("static", texts.len(), &vectors, None)?;
        }
        Ok(vectors)
    }
}
