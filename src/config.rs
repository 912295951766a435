//! Whole-pipeline configuration.
//!
//! One section per component, each defaulted, so a TOML file only needs
//! the values it changes:
//!
//! ```toml
//! [segmenter]
//! max_tokens = 120
//! overlap_tokens = 20
//!
//! [cluster]
//! max_clusters = 12
//!
//! [retriever]
//! mode = "tree_traversal"
//! top_k = 5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterConfig;
use crate::embed::EmbedderConfig;
use crate::error::{Error, Result};
use crate::hierarchy::BuilderConfig;
use crate::retrieve::RetrieverConfig;
use crate::retry::RetryConfig;
use crate::segment::SegmenterConfig;
use crate::summarize::SummarizerConfig;

/// Settings for segmenting, building and querying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaptorConfig {
    /// Chunking.
    pub segmenter: SegmenterConfig,
    /// Embedding adapter.
    pub embedder: EmbedderConfig,
    /// Per-level clustering.
    pub cluster: ClusterConfig,
    /// Cluster summaries.
    pub summarizer: SummarizerConfig,
    /// Level loop bounds and concurrency.
    pub builder: BuilderConfig,
    /// Question answering.
    pub retriever: RetrieverConfig,
}

impl RaptorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))
    }

    /// Reject settings that cannot produce a working pipeline.
    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmenter;
        ensure(seg.max_tokens > 0, "segmenter.max_tokens must be positive")?;
        ensure(
            seg.overlap_tokens < seg.max_tokens,
            "segmenter.overlap_tokens must be below max_tokens",
        )?;

        let emb = &self.embedder;
        ensure(emb.batch_size > 0, "embedder.batch_size must be positive")?;
        ensure(
            emb.max_concurrent_batches > 0,
            "embedder.max_concurrent_batches must be positive",
        )?;
        check_retry("embedder.retry", &emb.retry)?;

        let cl = &self.cluster;
        ensure(cl.max_clusters > 0, "cluster.max_clusters must be positive")?;
        ensure(
            cl.min_clusters <= cl.max_clusters,
            "cluster.min_clusters must not exceed max_clusters",
        )?;
        ensure(
            cl.membership_threshold > 0.0 && cl.membership_threshold < 1.0,
            "cluster.membership_threshold must lie in (0, 1)",
        )?;
        ensure(
            cl.reduced_dimension > 0,
            "cluster.reduced_dimension must be positive",
        )?;
        ensure(cl.max_iter > 0, "cluster.max_iter must be positive")?;
        ensure(
            cl.tol > 0.0 && cl.reg_covar >= 0.0,
            "cluster.tol must be positive and reg_covar non-negative",
        )?;

        let sum = &self.summarizer;
        ensure(sum.target_tokens > 0, "summarizer.target_tokens must be positive")?;
        ensure(
            sum.passage_budget(sum.target_tokens)
                .is_some_and(|budget| budget >= sum.target_tokens * 2),
            "summarizer.input_token_limit must hold the prompt and at least two summaries",
        )?;
        ensure(
            sum.max_concurrent_requests > 0,
            "summarizer.max_concurrent_requests must be positive",
        )?;
        check_retry("summarizer.retry", &sum.retry)?;

        let b = &self.builder;
        ensure(b.max_depth > 0, "builder.max_depth must be positive")?;
        ensure(
            b.root_fan_in_limit >= 2,
            "builder.root_fan_in_limit must be at least 2",
        )?;
        ensure(
            b.max_concurrent_summaries > 0,
            "builder.max_concurrent_summaries must be positive",
        )?;

        let r = &self.retriever;
        ensure(r.top_k > 0, "retriever.top_k must be positive")?;
        ensure(
            r.answer_max_tokens < r.context_token_limit,
            "retriever.answer_max_tokens must be below context_token_limit",
        )?;
        if let Some(min) = r.min_similarity {
            ensure(
                (-1.0..=1.0).contains(&min),
                "retriever.min_similarity must lie in [-1, 1]",
            )?;
        }
        check_retry("retriever.retry", &r.retry)?;
        Ok(())
    }
}

fn ensure(ok: bool, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::Config(message.to_string()))
    }
}

fn check_retry(section: &str, retry: &RetryConfig) -> Result<()> {
    ensure(
        retry.max_attempts > 0,
        &format!("{section}.max_attempts must be positive"),
    )?;
    ensure(
        retry.timeout_ms > 0,
        &format!("{section}.timeout_ms must be positive"),
    )?;
    ensure(
        retry.base_delay_ms <= retry.max_delay_ms,
        &format!("{section}.base_delay_ms must not exceed max_delay_ms"),
    )
}
