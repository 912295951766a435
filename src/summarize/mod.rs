//! Abstractive summarization of a cluster's member texts.
//!
//! The language model is a capability supplied by the caller through
//! [`CompletionModel`]. [`Summarizer`] turns a group of texts into one
//! summary request, pre-summarizing in sub-batches when the group would not
//! fit in the model's input window:
//!
//! ```text
//! texts ──► fits? ──yes──► complete(prompt)
//!             │
//!             no
//!             ▼
//!   pack into batches ──► summarize each ──► repeat on the partial summaries
//! ```
//!
//! Token counts are whitespace tokens (see [`crate::segment::count_tokens`]),
//! a coarse stand-in for the model's own tokenizer.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Error, ModelError, Result};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::segment::{count_tokens, truncate_tokens};

/// External text-completion capability.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "completion-model"
    }

    /// Complete `prompt`, producing at most about `max_tokens` tokens.
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> std::result::Result<String, ModelError>;
}

/// Summarizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Requested summary length, in tokens.
    pub target_tokens: usize,
    /// Largest prompt the model accepts, in tokens.
    pub input_token_limit: usize,
    /// Completion requests allowed in flight at once, shared by every
    /// clone of a [`Summarizer`].
    pub max_concurrent_requests: usize,
    /// Retry settings for model calls.
    pub retry: RetryConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            target_tokens: 150,
            input_token_limit: 3_000,
            max_concurrent_requests: 4,
            retry: RetryConfig::default(),
        }
    }
}

impl SummarizerConfig {
    /// Tokens left for passages in a summary prompt asking for
    /// `target_tokens`, or `None` when the template alone fills the window.
    pub fn passage_budget(&self, target_tokens: usize) -> Option<usize> {
        let overhead = count_tokens(&summary_prompt("", target_tokens));
        self.input_token_limit
            .checked_sub(overhead)
            .filter(|budget| *budget > 0)
    }
}

const PASSAGE_SEPARATOR: &str = "\n\n";

fn summary_prompt(passages: &str, target_tokens: usize) -> String {
    format!(
        "Write a summary of the following passages, including as many key details \
         as possible. Use about {target_tokens} words.\n\nPassages:\n{passages}"
    )
}

/// Concatenate `texts` and keep the first `max_tokens` tokens.
///
/// Used in place of a summary when the model cannot produce one.
pub fn extractive_fallback(texts: &[String], max_tokens: usize) -> String {
    let joined = join(texts);
    truncate_tokens(&joined, max_tokens).to_string()
}

fn join(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

/// Retrying summarizer over a [`CompletionModel`].
#[derive(Clone)]
pub struct Summarizer {
    model: Arc<dyn CompletionModel>,
    config: SummarizerConfig,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Summarizer {
    /// Wrap a model with default settings.
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self::with_config(model, SummarizerConfig::default())
    }

    /// Wrap a model with explicit settings.
    pub fn with_config(model: Arc<dyn CompletionModel>, config: SummarizerConfig) -> Self {
        let policy = config.retry.policy();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            model,
            config,
            policy,
            permits,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize `texts` into about `target_tokens` tokens.
    ///
    /// Fails with [`Error::Summarization`] once retries are exhausted.
    pub async fn summarize(&self, texts: &[String], target_tokens: usize) -> Result<String> {
        if texts.iter().all(|t| t.trim().is_empty()) {
            return Err(Error::EmptyInput);
        }
        let target_tokens = target_tokens.max(1);
        let budget = self.passage_budget(target_tokens)?;

        let mut current: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| truncate_tokens(t, budget).to_string())
            .collect();
        let mut round = 0usize;

        loop {
            let joined = join(&current);
            if count_tokens(&joined) <= budget {
                return self.complete_summary(&joined, target_tokens).await;
            }

            round += 1;
            let batches = pack(&current, budget);
            debug!(
                round,
                texts = current.len(),
                batches = batches.len(),
                "pre-summarizing oversized cluster"
            );
            let partials: Vec<String> = stream::iter(&batches)
                .map(|batch| self.complete_summary(batch, target_tokens))
                .buffered(self.config.max_concurrent_requests.max(1))
                .map_ok(|s| truncate_tokens(&s, target_tokens).to_string())
                .try_collect()
                .await?;

            let before = count_tokens(&joined);
            let after: usize = partials.iter().map(|p| count_tokens(p)).sum();
            if partials.len() >= current.len() && after >= before {
                // Summaries are not shrinking; summarize what fits.
                let clipped = truncate_tokens(&join(&partials), budget).to_string();
                return self.complete_summary(&clipped, target_tokens).await;
            }
            current = partials;
        }
    }

    fn passage_budget(&self, target_tokens: usize) -> Result<usize> {
        self.config
            .passage_budget(target_tokens)
            .ok_or(Error::InvalidParameter {
                name: "input_token_limit",
                message: "too small to hold the summary prompt",
            })
    }

    async fn complete_summary(&self, passages: &str, target_tokens: usize) -> Result<String> {
        let prompt = summary_prompt(passages, target_tokens);
        let prompt = &prompt;
        let model = &self.model;
        let permits = &self.permits;
        self.policy
            .run("summarize", move || async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| ModelError::Permanent("summarizer closed".into()))?;
                let text = model.complete(prompt, target_tokens).await?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(ModelError::Permanent("empty summary".into()));
                }
                Ok(text.to_string())
            })
            .await
            .map_err(|failure| Error::Summarization {
                attempts: failure.attempts,
                source: failure.last,
            })
    }
}

/// Greedily pack texts into joined batches of at most `budget` tokens.
fn pack(texts: &[String], budget: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut tokens = 0usize;
    for text in texts {
        let n = count_tokens(text);
        if !current.is_empty() && tokens + n > budget {
            batches.push(join(&current));
            current.clear();
            tokens = 0;
        }
        current.push(text.clone());
        tokens += n;
    }
    if !current.is_empty() {
        batches.push(join(&current));
    }
    batches
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::{fast_retry, ScriptedCompleter};

    fn summarizer(model: Arc<ScriptedCompleter>, input_token_limit: usize) -> Summarizer {
        Summarizer::with_config(
            model,
            SummarizerConfig {
                target_tokens: 10,
                input_token_limit,
                retry: fast_retry(),
                ..SummarizerConfig::default()
            },
        )
    }

    /// Echoes the tail of the prompt after a short delay, tracking how many
    /// calls overlap.
    #[derive(Default)]
    struct SlowCompleter {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionModel for SlowCompleter {
        async fn complete(
            &self,
            _prompt: &str,
            max_tokens: usize,
        ) -> std::result::Result<String, ModelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(words("s", max_tokens.min(3)))
        }
    }

    fn words(prefix: &str, n: usize) -> String {
        (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_single_request_when_texts_fit() {
        let model = Arc::new(ScriptedCompleter::extractive());
        let s = summarizer(model.clone(), 500);
        let out = s
            .summarize(&["alpha beta".to_string(), "gamma".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(model.calls(), 1);
        assert_eq!(out, "alpha beta gamma");
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("about 10 words"));
        assert!(prompt.ends_with("alpha beta\n\ngamma"));
    }

    #[tokio::test]
    async fn test_oversized_cluster_is_pre_summarized() {
        let model = Arc::new(ScriptedCompleter::extractive());
        let s = summarizer(model.clone(), 80);
        let texts: Vec<String> = (0..6).map(|i| words(&format!("t{i}w"), 40)).collect();
        let out = s.summarize(&texts, 10).await.unwrap();
        // More than one round trip, and the final prompt fits the window.
        assert!(model.calls() > 1);
        for prompt in model.prompts() {
            assert!(count_tokens(&prompt) <= 80, "{prompt}");
        }
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_summarization_error() {
        let model = Arc::new(ScriptedCompleter::failing(ModelError::Transient(
            "overloaded".into(),
        )));
        let s = summarizer(model.clone(), 500);
        let err = s.summarize(&["text".to_string()], 10).await.unwrap_err();
        assert!(matches!(err, Error::Summarization { attempts: 3, .. }));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let model = Arc::new(ScriptedCompleter::failing(ModelError::Permanent(
            "bad request".into(),
        )));
        let s = summarizer(model.clone(), 500);
        let err = s.summarize(&["text".to_string()], 10).await.unwrap_err();
        assert!(matches!(err, Error::Summarization { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_empty_summary_is_a_failure() {
        let model = Arc::new(ScriptedCompleter::new(|_, _| Ok("   ".into())));
        let s = summarizer(model, 500);
        assert!(s.summarize(&["text".to_string()], 10).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let s = summarizer(Arc::new(ScriptedCompleter::extractive()), 500);
        assert!(matches!(
            s.summarize(&[String::new(), " ".into()], 10).await,
            Err(Error::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_window_too_small_for_prompt() {
        let s = summarizer(Arc::new(ScriptedCompleter::extractive()), 5);
        assert!(matches!(
            s.summarize(&["text".to_string()], 10).await,
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn test_sub_batches_respect_request_limit() {
        let model = Arc::new(SlowCompleter::default());
        let s = Summarizer::with_config(
            model.clone(),
            SummarizerConfig {
                target_tokens: 10,
                input_token_limit: 60,
                max_concurrent_requests: 2,
                retry: fast_retry(),
            },
        );
        let texts: Vec<String> = (0..12).map(|i| words(&format!("t{i}w"), 30)).collect();
        s.summarize(&texts, 10).await.unwrap();
        assert!(model.calls.load(Ordering::SeqCst) > 2);
        assert_eq!(model.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_request_limit_is_shared_by_clones() {
        let model = Arc::new(SlowCompleter::default());
        let s = Summarizer::with_config(
            model.clone(),
            SummarizerConfig {
                max_concurrent_requests: 1,
                retry: fast_retry(),
                ..SummarizerConfig::default()
            },
        );
        let jobs = (0..4).map(|i| {
            let s = s.clone();
            async move { s.summarize(&[format!("text {i}")], 5).await }
        });
        for out in futures::future::join_all(jobs).await {
            out.unwrap();
        }
        assert_eq!(model.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_passage_budget_subtracts_template() {
        let config = SummarizerConfig {
            input_token_limit: 100,
            ..SummarizerConfig::default()
        };
        let overhead = count_tokens(&summary_prompt("", 9));
        assert_eq!(config.passage_budget(9), Some(100 - overhead));
        let tight = SummarizerConfig {
            input_token_limit: overhead,
            ..SummarizerConfig::default()
        };
        assert_eq!(tight.passage_budget(9), None);
    }

    #[test]
    fn test_extractive_fallback_truncates() {
        let texts = vec!["one two three".to_string(), "four five".to_string()];
        assert_eq!(extractive_fallback(&texts, 4), "one two three\n\nfour");
        assert_eq!(extractive_fallback(&texts, 100), "one two three\n\nfour five");
    }

    #[test]
    fn test_pack_respects_budget() {
        let texts = vec![words("a", 3), words("b", 3), words("c", 5)];
        let batches = pack(&texts, 6);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| count_tokens(b) <= 6));
    }
}
