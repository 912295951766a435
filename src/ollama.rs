//! HTTP adapter for a locally hosted Ollama server.
//!
//! Implements both [`EmbeddingModel`] and [`CompletionModel`]:
//!
//! - `POST /api/embed` for batched embeddings
//! - `POST /api/generate` (non-streaming) for completions
//! - `GET /api/tags` to list installed models
//!
//! Connection failures, 5xx and 429 responses are transient; other 4xx
//! responses and malformed bodies are permanent.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::EmbeddingModel;
use crate::error::{ModelError, Result};
use crate::summarize::CompletionModel;

/// Default server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for one Ollama server and a pair of models.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    embed_model: String,
    generate_model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    /// Client for the server at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        embed_model: impl Into<String>,
        generate_model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            embed_model: embed_model.into(),
            generate_model: generate_model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Client for the default local server.
    pub fn local(embed_model: impl Into<String>, generate_model: impl Into<String>) -> Self {
        Self::new(DEFAULT_BASE_URL, embed_model, generate_model)
    }

    /// Use a preconfigured HTTP client (proxies, TLS, pool settings).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Server address.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(request_error)?;
        let tags: TagsResponse = read_json(response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl EmbeddingModel for OllamaClient {
    fn name(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ModelError> {
        debug!(model = %self.embed_model, texts = texts.len(), "ollama embed");
        let body = EmbedRequest {
            model: &self.embed_model,
            input: texts,
        };
        let response = self
            .client
            .post(self.url("/api/embed"))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let parsed: EmbedResponse = read_json(response).await?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl CompletionModel for OllamaClient {
    fn name(&self) -> &str {
        &self.generate_model
    }

    async fn complete(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> std::result::Result<String, ModelError> {
        debug!(model = %self.generate_model, max_tokens, "ollama generate");
        let body = GenerateRequest {
            model: &self.generate_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: max_tokens,
            },
        };
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let parsed: GenerateResponse = read_json(response).await?;
        Ok(parsed.response)
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> std::result::Result<T, ModelError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ModelError::Permanent(format!("malformed response: {e}")))
}

fn request_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Transient(format!("request timed out: {e}"))
    } else if e.is_builder() {
        ModelError::Permanent(format!("bad request: {e}"))
    } else {
        ModelError::Transient(format!("request failed: {e}"))
    }
}

fn status_error(status: StatusCode, body: &str) -> ModelError {
    let message = format!("HTTP {status}: {}", body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ModelError::Transient(message)
    } else {
        ModelError::Permanent(message)
    }
}
