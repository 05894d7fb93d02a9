//! Text-generation client.
//!
//! Sends a fully composed prompt to a hosted LLM and returns the raw reply
//! text. Turning that text into structured data is the job of
//! [`response`](crate::response).
//!
//! Gemini request shape:
//!
//! ```json
//! { "contents": [{ "parts": [{ "text": "<prompt>" }] }],
//!   "generationConfig": { "temperature": 0.0 } }
//! ```
//!
//! The reply text is read from `candidates[0].content.parts[0].text`.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::GenerationError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[async_trait]
pub trait GenerationClient: Send + Sync {
    fn model_name(&self) -> &str;
    /// Send `prompt` and return the model's raw text reply.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Fails every call; used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationClient for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::ServiceFailure {
            provider: "disabled".to_string(),
            message: "generation provider is disabled".to_string(),
        })
    }
}

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    model: String,
    temperature: f32,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(
        model: impl Into<String>,
        temperature: f32,
        base_url: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            model: model.into(),
            temperature,
            base_url: base_url
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    fn failure(message: impl Into<String>) -> GenerationError {
        GenerationError::ServiceFailure {
            provider: "gemini".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "generation request");

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });
        let mut request = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::failure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(%status, "generation request rejected");
            return Err(Self::failure(format!("API error {}: {}", status, body_text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("invalid response body: {}", e)))?;

        reply_text(&json).ok_or(GenerationError::EmptyResponse)
    }
}

/// Extract `candidates[0].content.parts[0].text`.
fn reply_text(json: &Value) -> Option<String> {
    json.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Create the [`GenerationClient`] named by `generation.provider`.
pub fn create_generation_client(config: &GenerationConfig) -> Result<Box<dyn GenerationClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| anyhow!("generation.model required for gemini provider"))?;
            let var = config.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY");
            let api_key = std::env::var(var)
                .map_err(|_| anyhow!("{} environment variable not set", var))?;
            Ok(Box::new(GeminiGenerator::new(
                model,
                config.temperature,
                config.url.clone(),
                Some(api_key),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => bail!("Unknown generation provider: {}", other),
    }
}
