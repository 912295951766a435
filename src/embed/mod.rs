//! Embedding adapter: batching, caching and retry around an external model.
//!
//! The model itself is a capability supplied by the caller through
//! [`EmbeddingModel`]. [`Embedder`] adds:
//!
//! - de-duplication and a build-scoped [`EmbeddingCache`]
//! - batches of at most `batch_size` texts, `max_concurrent_batches` in flight
//! - per-call timeout and bounded exponential backoff ([`crate::retry`])
//! - validation of what the model returns (count, dimension, finiteness)
//!
//! Exhausted retries surface as [`Error::EmbeddingUnavailable`]; a failed
//! text is never replaced by a zero vector.

mod cache;

pub use cache::{content_hash, CacheStats, ContentHash, EmbeddingCache};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::Cancellation;
use crate::error::{Error, ModelError, Result};
use crate::retry::{RetryConfig, RetryPolicy};

/// External embedding capability.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "embedding-model"
    }

    /// Embed `texts`, returning one vector per text in the same order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ModelError>;
}

/// Embedding adapter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Maximum texts per model call.
    pub batch_size: usize,
    /// Maximum model calls in flight.
    pub max_concurrent_batches: usize,
    /// Retry settings for model calls.
    pub retry: RetryConfig,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_concurrent_batches: 4,
            retry: RetryConfig::default(),
        }
    }
}

/// Batching, caching, retrying wrapper around an [`EmbeddingModel`].
#[derive(Clone)]
pub struct Embedder {
    model: Arc<dyn EmbeddingModel>,
    config: EmbedderConfig,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Embedder {
    /// Wrap a model with default settings.
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self::with_config(model, EmbedderConfig::default())
    }

    /// Wrap a model with explicit settings.
    pub fn with_config(model: Arc<dyn EmbeddingModel>, config: EmbedderConfig) -> Self {
        let policy = config.retry.policy();
        Self {
            model,
            config,
            policy,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &EmbedderConfig {
        &self.config
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str, cache: &EmbeddingCache) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()], cache).await?;
        out.pop().ok_or(Error::EmptyInput)
    }

    /// Embed `texts` in order.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        cache: &EmbeddingCache,
    ) -> Result<Vec<Vec<f32>>> {
        self.embed_batch_with(texts, cache, &Cancellation::new())
            .await
    }

    /// Embed `texts` in order, checking `cancel` before each model call.
    pub async fn embed_batch_with(
        &self,
        texts: &[String],
        cache: &EmbeddingCache,
        cancel: &Cancellation,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<ContentHash> = texts.iter().map(|t| content_hash(t)).collect();

        // Distinct texts the cache cannot answer, in first-seen order.
        let mut seen = HashSet::new();
        let mut pending: Vec<(ContentHash, String)> = Vec::new();
        for (key, text) in keys.iter().zip(texts) {
            if !seen.insert(*key) {
                continue;
            }
            if cache.get(key).is_none() {
                pending.push((*key, text.clone()));
            }
        }

        debug!(
            model = self.model.name(),
            requested = texts.len(),
            to_embed = pending.len(),
            "embedding batch"
        );

        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<&[(ContentHash, String)]> = pending.chunks(batch_size).collect();
        let outcomes: Vec<Result<Vec<Vec<f32>>>> = stream::iter(batches.iter().copied())
            .map(|batch| self.embed_uncached(batch, cancel))
            .buffered(self.config.max_concurrent_batches.max(1))
            .collect()
            .await;

        for (batch, outcome) in batches.iter().zip(outcomes) {
            let vectors = outcome?;
            for ((key, _), vector) in batch.iter().zip(vectors) {
                cache.insert(*key, vector);
            }
        }

        let mut out = Vec::with_capacity(texts.len());
        let mut dimension: Option<usize> = None;
        for key in &keys {
            let vector = cache
                .peek(key)
                .ok_or_else(|| Error::InvalidInput("embedding missing from cache".into()))?;
            match dimension {
                None => dimension = Some(vector.len()),
                Some(d) if d != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected: d,
                        found: vector.len(),
                    })
                }
                Some(_) => {}
            }
            out.push(vector.as_ref().clone());
        }
        Ok(out)
    }

    async fn embed_uncached(
        &self,
        batch: &[(ContentHash, String)],
        cancel: &Cancellation,
    ) -> Result<Vec<Vec<f32>>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
        let texts = &texts;
        let model = &self.model;
        self.policy
            .run("embed", move || async move {
                let vectors = model.embed(texts).await?;
                check_vectors(&vectors, texts.len())?;
                Ok(vectors)
            })
            .await
            .map_err(|failure| Error::EmbeddingUnavailable {
                attempts: failure.attempts,
                source: failure.last,
            })
    }
}

fn check_vectors(vectors: &[Vec<f32>], expected: usize) -> std::result::Result<(), ModelError> {
    if vectors.len() != expected {
        return Err(ModelError::Permanent(format!(
            "model returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    for v in vectors {
        if v.is_empty() || v.len() != dim {
            return Err(ModelError::Permanent(format!(
                "inconsistent embedding dimension: {} vs {}",
                v.len(),
                dim
            )));
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(ModelError::Permanent("non-finite embedding value".into()));
        }
    }
    Ok(())
}
