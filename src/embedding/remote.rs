//! HTTP embedding backends.
//!
//! One [`RemoteEmbedder`] serves all three hosted APIs; the
//! [`ProviderKind`] selects the endpoint, request body, and response shape.
//!
//! | Kind | Endpoint | Response |
//! |------|----------|----------|
//! | Gemini | `POST {base}/models/{model}:batchEmbedContents` | `embeddings[].values` |
//! | OpenAI | `POST {base}/embeddings` | `data[].embedding` (ordered by `data[].index`) |
//! | Ollama | `POST {base}/api/embed` | `embeddings[][]` |
//!
//! Inputs longer than `batch_size` are sent as consecutive batches and the
//! results concatenated in input order. Failures are not retried.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{validate_embeddings, EmbeddingClient};
use crate::config::EmbeddingConfig;
use crate::error::RetrievalError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Which hosted embedding API a [`RemoteEmbedder`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAI,
    Ollama,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => GEMINI_BASE_URL,
            ProviderKind::OpenAI => OPENAI_BASE_URL,
            ProviderKind::Ollama => OLLAMA_BASE_URL,
        }
    }

    /// Environment variable holding the API key, if the API needs one.
    fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }
}

/// Embedding client backed by a hosted HTTP API.
pub struct RemoteEmbedder {
    kind: ProviderKind,
    model: String,
    dims: Option<usize>,
    batch_size: usize,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RemoteEmbedder {
    /// Create a client with a 30 second timeout and a batch size of 100.
    pub fn new(
        kind: ProviderKind,
        model: impl Into<String>,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = build_client(Duration::from_secs(30))?;
        Ok(Self {
            kind,
            model: model.into(),
            dims: None,
            batch_size: 100,
            base_url: base_url
                .unwrap_or_else(|| kind.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client,
        })
    }

    /// Create a client from the `[embedding]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set or the API key environment
    /// variable is missing.
    pub fn from_config(kind: ProviderKind, config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for {} provider", kind.name()))?;

        let key_env = config
            .api_key_env
            .as_deref()
            .or(kind.default_api_key_env());
        let api_key = match key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| anyhow!("{} environment variable not set", var))?,
            ),
            None => None,
        };

        let mut embedder = Self::new(kind, model, config.url.clone(), api_key)?
            .with_batch_size(config.batch_size)
            .with_timeout(Duration::from_secs(config.timeout_secs))?;
        embedder.dims = config.dims;
        Ok(embedder)
    }

    /// Maximum number of texts per network call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Require every returned vector to have `dims` values.
    pub fn with_dims(mut self, dims: usize) -> Self {
        self.dims = Some(dims);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn failure(&self, message: impl Into<String>) -> RetrievalError {
        RetrievalError::service(self.kind.name(), message)
    }

    /// Send one batch and parse the response. Shape checks happen in the caller.
    async fn send_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let request = match self.kind {
            ProviderKind::Gemini => {
                let requests: Vec<Value> = batch
                    .iter()
                    .map(|t| {
                        json!({
                            "model": format!("models/{}", self.model),
                            "content": { "parts": [{ "text": t }] },
                        })
                    })
                    .collect();
                let mut req = self
                    .client
                    .post(format!(
                        "{}/models/{}:batchEmbedContents",
                        self.base_url, self.model
                    ))
                    .json(&json!({ "requests": requests }));
                if let Some(key) = &self.api_key {
                    req = req.header("x-goog-api-key", key);
                }
                req
            }
            ProviderKind::OpenAI => {
                let mut req = self
                    .client
                    .post(format!("{}/embeddings", self.base_url))
                    .json(&json!({ "model": self.model, "input": batch }));
                if let Some(key) = &self.api_key {
                    req = req.bearer_auth(key);
                }
                req
            }
            ProviderKind::Ollama => self
                .client
                .post(format!("{}/api/embed", self.base_url))
                .json(&json!({ "model": self.model, "input": batch })),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                self.failure(format!("request timed out: {}", e))
            } else {
                self.failure(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(provider = self.kind.name(), %status, "embedding request rejected");
            return Err(self.failure(format!("API error {}: {}", status, body_text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| self.failure(format!("invalid response body: {}", e)))?;

        let parsed = match self.kind {
            ProviderKind::Gemini => parse_gemini_response(&json),
            ProviderKind::OpenAI => parse_openai_response(&json),
            ProviderKind::Ollama => parse_ollama_response(&json),
        };
        parsed.map_err(|message| self.failure(message))
    }
}

#[async_trait]
impl EmbeddingClient for RemoteEmbedder {
    fn provider(&self) -> &str {
        self.kind.name()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut dims = self.dims;
        let mut out = Vec::with_capacity(texts.len());

        for (n, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                provider = self.kind.name(),
                batch = n,
                texts = batch.len(),
                "embedding batch"
            );
            let vectors = self.send_batch(batch).await?;
            dims = validate_embeddings(self.kind.name(), batch.len(), &vectors, dims)?;
            out.extend(vectors);
        }

        Ok(out)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Convert a JSON array of numbers into an `f32` vector.
fn parse_vector(value: &Value, what: &str) -> Result<Vec<f32>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("{} is not an array", what))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| format!("{} contains a non-numeric value", what))
        })
        .collect()
}

/// Parse a Gemini `batchEmbedContents` response.
fn parse_gemini_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or("missing embeddings array")?;

    embeddings
        .iter()
        .map(|e| {
            let values = e.get("values").ok_or("embedding entry missing values")?;
            parse_vector(values, "embedding values")
        })
        .collect()
}

/// Parse an OpenAI embeddings response, restoring input order from `index`.
///
/// The indices must cover `0..data.len()` exactly once each.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or("missing data array")?;

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; data.len()];
    for (pos, item) in data.iter().enumerate() {
        let embedding = item.get("embedding").ok_or("data entry missing embedding")?;
        let index = match item.get("index") {
            None => pos,
            Some(i) => i
                .as_u64()
                .map(|i| i as usize)
                .ok_or("data entry has a non-integer index")?,
        };
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| format!("data index {} out of range for {} entries", index, data.len()))?;
        if slot.is_some() {
            return Err(format!("data index {} appears more than once", index));
        }
        *slot = Some(parse_vector(embedding, "embedding")?);
    }

    // Every slot is filled: `data.len()` distinct in-range indices.
    Ok(slots.into_iter().flatten().collect())
}

/// Parse an Ollama `/api/embed` response.
fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or("missing embeddings array")?;

    embeddings
        .iter()
        .map(|e| parse_vector(e, "embedding"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_mock;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Gemini-shaped mock that embeds each text as `[len, call_number]`,
    /// dropping `drop_last` vectors from every reply.
    fn gemini_mock(calls: Arc<AtomicUsize>, drop_last: usize) -> Router {
        Router::new()
            .route(
                "/models/{call}",
                post(
                    move |State(calls): State<Arc<AtomicUsize>>, Json(body): Json<Value>| async move {
                        let call = calls.fetch_add(1, Ordering::SeqCst) as f64;
                        let requests = body["requests"].as_array().cloned().unwrap_or_default();
                        let keep = requests.len().saturating_sub(drop_last);
                        let embeddings: Vec<Value> = requests
                            .iter()
                            .take(keep)
                            .map(|r| {
                                let text = r["content"]["parts"][0]["text"].as_str().unwrap_or("");
                                json!({ "values": [text.len() as f64, call] })
                            })
                            .collect();
                        Json(json!({ "embeddings": embeddings }))
                    },
                ),
            )
            .with_state(calls)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_gemini_response() {
        let json = json!({ "embeddings": [{ "values": [0.5, -1.0] }, { "values": [2, 3] }] });
        assert_eq!(
            parse_gemini_response(&json).unwrap(),
            vec![vec![0.5, -1.0], vec![2.0, 3.0]]
        );
        assert!(parse_gemini_response(&json!({ "embedding": [] })).is_err());
        assert!(parse_gemini_response(&json!({ "embeddings": [{ "values": ["x"] }] })).is_err());
    }

    #[test]
    fn test_parse_openai_response_reorders_by_index() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        assert_eq!(
            parse_openai_response(&json).unwrap(),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        );
        assert!(parse_openai_response(&json!({ "data": [{ "index": 0 }] })).is_err());
    }

    #[test]
    fn test_parse_openai_response_rejects_bad_indices() {
        let duplicate = json!({
            "data": [
                { "index": 0, "embedding": [1.0, 0.0] },
                { "index": 0, "embedding": [0.0, 1.0] }
            ]
        });
        let err = parse_openai_response(&duplicate).unwrap_err();
        assert!(err.contains("more than once"), "got {}", err);

        let out_of_range = json!({
            "data": [
                { "index": 0, "embedding": [1.0, 0.0] },
                { "index": 2, "embedding": [0.0, 1.0] }
            ]
        });
        let err = parse_openai_response(&out_of_range).unwrap_err();
        assert!(err.contains("out of range"), "got {}", err);

        let negative = json!({ "data": [{ "index": -1, "embedding": [1.0] }] });
        assert!(parse_openai_response(&negative).is_err());
    }

    #[tokio::test]
    async fn test_duplicate_openai_indices_are_service_failure() {
        let router = Router::new().route(
            "/embeddings",
            post(|| async {
                Json(json!({
                    "data": [
                        { "index": 1, "embedding": [1.0, 0.0] },
                        { "index": 1, "embedding": [0.0, 1.0] }
                    ]
                }))
            }),
        );
        let base = spawn_mock(router).await;
        let embedder = RemoteEmbedder::new(
            ProviderKind::OpenAI,
            "text-embedding-3-small",
            Some(base),
            Some("sk-test".to_string()),
        )
        .unwrap();

        let err = embedder.embed(&texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingServiceFailure { .. }));
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = json!({ "embeddings": [[1.0, 2.0], [3.0, 4.0]] });
        assert_eq!(parse_ollama_response(&json).unwrap().len(), 2);
        assert!(parse_ollama_response(&json!({ "embeddings": [1.0] })).is_err());
    }

    #[tokio::test]
    async fn test_gemini_round_trip_through_mock() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_mock(gemini_mock(calls.clone(), 0)).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Gemini, "text-embedding-004", Some(base), None)
                .unwrap();

        let vectors = embedder.embed(&texts(&["a", "bb", "ccc"])).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0]]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_mock(gemini_mock(calls.clone(), 0)).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Gemini, "text-embedding-004", Some(base), None)
                .unwrap();

        assert!(embedder.embed(&[]).await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_mock(gemini_mock(calls.clone(), 0)).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Gemini, "text-embedding-004", Some(base), None)
                .unwrap()
                .with_batch_size(2);

        let vectors = embedder
            .embed(&texts(&["a", "bb", "ccc", "dddd", "eeeee"]))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let batch_ids: Vec<f32> = vectors.iter().map(|v| v[1]).collect();
        assert_eq!(batch_ids, vec![0.0, 0.0, 1.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_dimension_change_across_batches_is_service_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/models/{call}",
                post(
                    |State(calls): State<Arc<AtomicUsize>>, Json(body): Json<Value>| async move {
                        let call = calls.fetch_add(1, Ordering::SeqCst);
                        let width = if call == 0 { 2 } else { 3 };
                        let embeddings: Vec<Value> = body["requests"]
                            .as_array()
                            .map(|r| r.iter().map(|_| json!({ "values": vec![0.5; width] })).collect())
                            .unwrap_or_default();
                        Json(json!({ "embeddings": embeddings }))
                    },
                ),
            )
            .with_state(calls.clone());
        let base = spawn_mock(router).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Gemini, "text-embedding-004", Some(base), None)
                .unwrap()
                .with_batch_size(1);

        let err = embedder.embed(&texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingServiceFailure { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_reply_is_count_mismatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_mock(gemini_mock(calls.clone(), 1)).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Gemini, "text-embedding-004", Some(base), None)
                .unwrap();

        let err = embedder.embed(&texts(&["a", "b", "c"])).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::EmbeddingCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_configured_dims_enforced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_mock(gemini_mock(calls, 0)).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Gemini, "text-embedding-004", Some(base), None)
                .unwrap()
                .with_dims(768);

        let err = embedder.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingServiceFailure { .. }));
    }

    #[tokio::test]
    async fn test_http_error_is_service_failure() {
        let router = Router::new().route(
            "/embeddings",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = spawn_mock(router).await;
        let embedder = RemoteEmbedder::new(
            ProviderKind::OpenAI,
            "text-embedding-3-small",
            Some(base),
            Some("sk-test".to_string()),
        )
        .unwrap();

        let err = embedder.embed(&texts(&["a"])).await.unwrap_err();
        match err {
            RetrievalError::EmbeddingServiceFailure { provider, message } => {
                assert_eq!(provider, "openai");
                assert!(message.contains("429"), "got {}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_service_failure() {
        let router = Router::new().route("/api/embed", post(|| async { "not json" }));
        let base = spawn_mock(router).await;
        let embedder =
            RemoteEmbedder::new(ProviderKind::Ollama, "nomic-embed-text", Some(base), None)
                .unwrap();

        let err = embedder.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingServiceFailure { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_service_failure() {
        let embedder = RemoteEmbedder::new(
            ProviderKind::Ollama,
            "nomic-embed-text",
            Some("http://127.0.0.1:1".to_string()),
            None,
        )
        .unwrap();

        let err = embedder.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingServiceFailure { .. }));
    }
}
