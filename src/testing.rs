//! Deterministic stand-ins for the external model capabilities.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embed::EmbeddingModel;
use crate::error::ModelError;
use crate::retry::RetryConfig;
use crate::summarize::CompletionModel;

/// Retry settings that keep tests fast.
pub(crate) fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        timeout_ms: 5_000,
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn fnv1a(word: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for b in word.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Bag-of-words feature-hashing embedder.
#[derive(Debug)]
pub(crate) struct HashEmbedder {
    dim: usize,
    fail_first: AtomicU32,
    batches: Mutex<Vec<usize>>,
    embedded: AtomicUsize,
}

impl HashEmbedder {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            dim,
            fail_first: AtomicU32::new(0),
            batches: Mutex::new(Vec::new()),
            embedded: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` calls with a transient error.
    pub(crate) fn failing_first(self, n: u32) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let mut any = false;
        for w in words(text) {
            v[(fnv1a(&w) % self.dim as u64) as usize] += 1.0;
            any = true;
        }
        if !any {
            v[0] = 1.0;
        }
        v
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub(crate) fn texts_embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    fn name(&self) -> &str {
        "hash-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(ModelError::Transient("warming up".into()));
        }
        self.batches.lock().unwrap().push(texts.len());
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Embedder whose server never answers.
#[derive(Debug, Default)]
pub(crate) struct UnreachableEmbedder {
    pub(crate) calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingModel for UnreachableEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::Transient("connection refused".into()))
    }
}

type Script = dyn Fn(&str, usize) -> Result<String, ModelError> + Send + Sync;

/// Completion model driven by a closure over (prompt, max_tokens).
pub(crate) struct ScriptedCompleter {
    script: Box<Script>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String, ModelError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Echoes the first tokens of the material that follows the last
    /// blank-line-terminated header of the prompt.
    pub(crate) fn extractive() -> Self {
        Self::new(|prompt, max_tokens| {
            let body = prompt
                .rsplit_once(":\n")
                .map(|(_, body)| body)
                .unwrap_or(prompt);
            let take = max_tokens.clamp(1, 40);
            Ok(body.split_whitespace().take(take).collect::<Vec<_>>().join(" "))
        })
    }

    /// Every call fails with the given error.
    pub(crate) fn failing(err: ModelError) -> Self {
        Self::new(move |_, _| Err(err.clone()))
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompleter {
    fn name(&self) -> &str {
        "scripted-completer"
    }

    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.script)(prompt, max_tokens)
    }
}
