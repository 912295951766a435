//! RAPTOR-style tree construction.
//!
//! RAPTOR (Recursive Abstractive Processing for Tree-Organized Retrieval)
//! builds a tree by:
//! 1. Clustering the nodes of the current level
//! 2. Summarizing each cluster into a parent node
//! 3. Embedding the summaries and repeating on the new level
//!
//! ```text
//!  LEVEL_READY ──cluster──► CLUSTERED ──summarize+embed──► LEVEL_READY (k+1)
//!       │                       │
//!       └── one node ──► DONE ◄─┘ one cluster, or level bound reached
//! ```
//!
//! Levels are strictly sequential. Within a level, cluster summaries run
//! concurrently up to `max_concurrent_summaries`; outputs are collected in
//! cluster order so node ids do not depend on completion order.
//!
//! ## References
//!
//! Sarthi et al. (2024). "RAPTOR: Recursive Abstractive Processing for
//! Tree-Organized Retrieval." ICLR 2024.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::node::{Node, NodeId};
use super::tree::Tree;
use crate::cancel::Cancellation;
use crate::cluster::{ClusterAssignment, ClusterEngine};
use crate::embed::{CacheStats, Embedder, EmbeddingCache};
use crate::error::{Error, Result};
use crate::index::TreeIndex;
use crate::segment::Chunk;
use crate::summarize::{extractive_fallback, Summarizer};

/// Tree construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Maximum number of summary levels above the leaves.
    pub max_depth: usize,
    /// Largest top level that may be folded into a forced root when the
    /// depth bound is reached.
    pub root_fan_in_limit: usize,
    /// Summaries in flight within one level.
    pub max_concurrent_summaries: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            root_fan_in_limit: 64,
            max_concurrent_summaries: 4,
        }
    }
}

impl BuilderConfig {
    /// Set maximum depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the forced-root fan-in limit.
    pub fn with_root_fan_in_limit(mut self, limit: usize) -> Self {
        self.root_fan_in_limit = limit;
        self
    }

    /// Set summary concurrency.
    pub fn with_max_concurrent_summaries(mut self, n: usize) -> Self {
        self.max_concurrent_summaries = n;
        self
    }
}

/// What happened during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Nodes per level, leaves first.
    pub level_sizes: Vec<usize>,
    /// Summary nodes holding an extractive fallback.
    pub degraded: Vec<NodeId>,
    /// True when the depth bound forced the final root.
    pub forced_root: bool,
    /// Embedding cache counters at the end of the build.
    pub cache: CacheStats,
}

impl BuildReport {
    /// Levels built, leaves included.
    pub fn levels(&self) -> usize {
        self.level_sizes.len()
    }
}

/// A finished tree and how it was built.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// The tree.
    pub tree: Tree,
    /// Build statistics.
    pub report: BuildReport,
}

struct SummaryOutcome {
    text: String,
    degraded: bool,
}

/// Grows a [`Tree`] from leaf chunks.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    embedder: Embedder,
    summarizer: Summarizer,
    engine: ClusterEngine,
    config: BuilderConfig,
}

impl TreeBuilder {
    /// Create a builder.
    pub fn new(
        embedder: Embedder,
        summarizer: Summarizer,
        engine: ClusterEngine,
        config: BuilderConfig,
    ) -> Self {
        Self {
            embedder,
            summarizer,
            engine,
            config,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build a tree without a cancellation handle.
    pub async fn build_tree(&self, chunks: Vec<Chunk>) -> Result<BuildOutput> {
        self.build_tree_with(chunks, &Cancellation::new()).await
    }

    /// Build a tree over `chunks`.
    ///
    /// Embedding and clustering failures abort the build. A failed summary
    /// degrades to an extractive fallback and is listed in the report.
    /// `cancel` is checked before every embedding batch and every summary;
    /// work already in flight runs to completion first.
    pub async fn build_tree_with(
        &self,
        chunks: Vec<Chunk>,
        cancel: &Cancellation,
    ) -> Result<BuildOutput> {
        if chunks.is_empty() {
            return Err(Error::EmptyInput);
        }
        if chunks.len() >= u32::MAX as usize / 2 {
            return Err(Error::InvalidInput(format!(
                "{} chunks exceed the node id space",
                chunks.len()
            )));
        }

        // Scoped to this build; dropped with it.
        let cache = EmbeddingCache::new();
        let mut report = BuildReport::default();

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch_with(&texts, &cache, cancel).await?;
        let mut nodes: Vec<Node> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, v))| Node::leaf(NodeId::from_index(i), chunk, v))
            .collect();
        let mut primary: Vec<Option<NodeId>> = vec![None; nodes.len()];
        let mut levels: Vec<Vec<NodeId>> = vec![nodes.iter().map(|n| n.id).collect()];
        info!(leaves = nodes.len(), "tree build started");

        let mut level = 0usize;
        loop {
            let current = &levels[level];
            if current.len() == 1 {
                break;
            }
            if cancel.is_cancelled() {
                info!(level, "tree build cancelled");
                return Err(Error::Cancelled);
            }

            let next_level = level + 1;
            let assignment = if next_level > self.config.max_depth {
                return Err(self.capacity_error(&nodes, &levels));
            } else if next_level == self.config.max_depth {
                if current.len() > self.config.root_fan_in_limit {
                    return Err(self.capacity_error(&nodes, &levels));
                }
                report.forced_root = true;
                ClusterAssignment::single(current.len())
            } else {
                let vectors: Vec<Vec<f32>> = current
                    .iter()
                    .map(|id| nodes[id.index()].embedding.clone())
                    .collect();
                self.engine.cluster_level(&vectors)?
            };

            let members: Vec<Vec<NodeId>> = assignment
                .clusters()
                .into_iter()
                .map(|cluster| cluster.into_iter().map(|i| current[i]).collect())
                .collect();
            debug!(
                level = next_level,
                nodes = current.len(),
                clusters = members.len(),
                "level clustered"
            );

            let outcomes = self.summarize_clusters(&nodes, &members, next_level, cancel).await?;

            let summary_texts: Vec<String> = outcomes.iter().map(|o| o.text.clone()).collect();
            let summary_vectors = self
                .embedder
                .embed_batch_with(&summary_texts, &cache, cancel)
                .await?;

            let first_id = nodes.len();
            let new_ids: Vec<NodeId> = (first_id..first_id + members.len())
                .map(NodeId::from_index)
                .collect();
            for (pos, &node_id) in current.iter().enumerate() {
                primary[node_id.index()] = Some(new_ids[assignment.primary(pos)]);
            }
            for (((outcome, vector), kids), &id) in outcomes
                .into_iter()
                .zip(summary_vectors)
                .zip(members)
                .zip(&new_ids)
            {
                if outcome.degraded {
                    report.degraded.push(id);
                }
                nodes.push(Node::summary(
                    id,
                    next_level,
                    outcome.text,
                    outcome.degraded,
                    kids,
                    vector,
                ));
                primary.push(None);
            }
            info!(level = next_level, nodes = new_ids.len(), "level built");
            levels.push(new_ids);
            level = next_level;
        }

        let root = levels[level][0];
        report.level_sizes = levels.iter().map(Vec::len).collect();
        report.cache = cache.stats();
        info!(
            levels = report.levels(),
            nodes = nodes.len(),
            degraded = report.degraded.len(),
            cache_hits = report.cache.hits,
            "tree build finished"
        );
        let tree = Tree::from_parts(nodes, levels, root, primary)?;
        Ok(BuildOutput { tree, report })
    }

    async fn summarize_clusters(
        &self,
        nodes: &[Node],
        members: &[Vec<NodeId>],
        level: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<SummaryOutcome>> {
        let target = self.summarizer.config().target_tokens;
        let outcomes: Vec<Result<SummaryOutcome>> = stream::iter(members.iter().enumerate())
            .map(|(cluster, ids)| async move {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let texts: Vec<String> = ids
                    .iter()
                    .map(|id| nodes[id.index()].text().to_string())
                    .collect();
                match self.summarizer.summarize(&texts, target).await {
                    Ok(text) => Ok(SummaryOutcome {
                        text,
                        degraded: false,
                    }),
                    Err(Error::Summarization { attempts, source }) => {
                        warn!(
                            level,
                            cluster,
                            attempts,
                            error = %source,
                            "summary failed, using extractive fallback"
                        );
                        Ok(SummaryOutcome {
                            text: extractive_fallback(&texts, target),
                            degraded: true,
                        })
                    }
                    Err(e) => Err(e),
                }
            })
            .buffered(self.config.max_concurrent_summaries.max(1))
            .collect()
            .await;
        outcomes.into_iter().collect()
    }

    fn capacity_error(&self, nodes: &[Node], levels: &[Vec<NodeId>]) -> Error {
        let top_nodes = levels.last().map(Vec::len).unwrap_or(0);
        warn!(
            levels = levels.len(),
            top_nodes,
            limit = self.config.root_fan_in_limit,
            "document exceeds the level bound, falling back to leaf-only index"
        );
        let leaves: Vec<Node> = levels
            .first()
            .into_iter()
            .flatten()
            .map(|id| nodes[id.index()].clone())
            .collect();
        match TreeIndex::leaf_only(leaves) {
            Ok(fallback) => Error::Capacity {
                levels: levels.len(),
                top_nodes,
                limit: self.config.root_fan_in_limit,
                fallback: Box::new(fallback),
            },
            Err(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cluster::ClusterConfig;
    use crate::embed::EmbedderConfig;
    use crate::error::ModelError;
    use crate::segment::segment;
    use crate::summarize::SummarizerConfig;
    use crate::testing::{fast_retry, HashEmbedder, ScriptedCompleter, UnreachableEmbedder};

    fn builder_with(
        embedder: Arc<dyn crate::embed::EmbeddingModel>,
        completer: Arc<dyn crate::summarize::CompletionModel>,
        config: BuilderConfig,
    ) -> TreeBuilder {
        TreeBuilder::new(
            Embedder::with_config(
                embedder,
                EmbedderConfig {
                    retry: fast_retry(),
                    ..EmbedderConfig::default()
                },
            ),
            Summarizer::with_config(
                completer,
                SummarizerConfig {
                    target_tokens: 12,
                    retry: fast_retry(),
                    ..SummarizerConfig::default()
                },
            ),
            ClusterEngine::new(ClusterConfig::default()),
            config,
        )
    }

    fn document(paragraphs: usize) -> String {
        let topics = ["orchard apple pear harvest", "engine piston fuel torque", "river delta tide silt"];
        (0..paragraphs)
            .map(|i| {
                let t = topics[i % topics.len()];
                format!("Paragraph {i} talks about {t} and more {t} details. It ends here.")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn chunks(paragraphs: usize) -> Vec<Chunk> {
        segment(&document(paragraphs), 20, 0).unwrap()
    }

    #[tokio::test]
    async fn test_single_chunk_is_its_own_root() {
        let completer = Arc::new(ScriptedCompleter::extractive());
        let builder = builder_with(
            Arc::new(HashEmbedder::new(32)),
            completer.clone(),
            BuilderConfig::default(),
        );
        let out = builder
            .build_tree(segment("One short paragraph.", 50, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(out.tree.depth(), 1);
        assert_eq!(out.tree.root(), NodeId(0));
        assert!(out.tree.root_node().is_leaf());
        assert_eq!(completer.calls(), 0);
    }

    #[tokio::test]
    async fn test_builds_single_rooted_tree() {
        let builder = builder_with(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(ScriptedCompleter::extractive()),
            BuilderConfig::default(),
        );
        let out = builder.build_tree(chunks(12)).await.unwrap();
        let tree = &out.tree;
        assert!(tree.depth() >= 2);
        assert_eq!(tree.levels().last().unwrap().len(), 1);
        let report = tree.validate();
        assert!(report.is_healthy(), "{report}");
        assert_eq!(out.report.level_sizes, report.level_sizes);
        assert!(out.report.degraded.is_empty());
        for node in tree.iter() {
            if node.id != tree.root() {
                assert!(tree.parent(node.id).is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_failed_summaries_degrade() {
        let builder = builder_with(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(ScriptedCompleter::failing(ModelError::Transient("down".into()))),
            BuilderConfig::default(),
        );
        let out = builder.build_tree(chunks(9)).await.unwrap();
        let summaries: Vec<&Node> = out.tree.iter().filter(|n| !n.is_leaf()).collect();
        assert!(!summaries.is_empty());
        assert!(summaries.iter().all(|n| n.is_degraded()));
        assert_eq!(out.report.degraded.len(), summaries.len());
        assert!(out.tree.validate().is_healthy());
    }

    #[tokio::test]
    async fn test_embedding_outage_aborts() {
        let builder = builder_with(
            Arc::new(UnreachableEmbedder::default()),
            Arc::new(ScriptedCompleter::extractive()),
            BuilderConfig::default(),
        );
        let err = builder.build_tree(chunks(4)).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable { .. }));
        assert!(err.is_build_failure());
    }

    #[tokio::test]
    async fn test_depth_bound_forces_root() {
        let builder = builder_with(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(ScriptedCompleter::extractive()),
            BuilderConfig::default().with_max_depth(1),
        );
        let out = builder.build_tree(chunks(10)).await.unwrap();
        assert_eq!(out.tree.depth(), 2);
        assert!(out.report.forced_root);
        assert_eq!(out.tree.root_node().children.len(), out.tree.leaves().count());
    }

    #[tokio::test]
    async fn test_capacity_error_carries_leaf_index() {
        let builder = builder_with(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(ScriptedCompleter::extractive()),
            BuilderConfig::default()
                .with_max_depth(1)
                .with_root_fan_in_limit(3),
        );
        let leaves = chunks(10);
        let n = leaves.len();
        let err = builder.build_tree(leaves).await.unwrap_err();
        assert!(err.is_build_failure());
        let fallback = err.fallback_index().unwrap();
        assert!(fallback.is_leaf_only());
        assert_eq!(fallback.len(), n);
    }

    #[tokio::test]
    async fn test_cancelled_build_stops() {
        let builder = builder_with(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(ScriptedCompleter::extractive()),
            BuilderConfig::default(),
        );
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = builder.build_tree_with(chunks(6), &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let builder = builder_with(
            Arc::new(HashEmbedder::new(8)),
            Arc::new(ScriptedCompleter::extractive()),
            BuilderConfig::default(),
        );
        assert!(matches!(builder.build_tree(Vec::new()).await, Err(Error::EmptyInput)));
    }
}
