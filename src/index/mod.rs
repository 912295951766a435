//! Nearest-neighbour search over tree nodes.
//!
//! Every node vector is L2-normalized once at index build, so cosine
//! similarity is a dot product. Queries are an exact linear scan
//! (parallel under the `parallel` feature); results are ordered by
//! descending similarity with ties broken by lower node id, which keeps
//! rankings stable across runs and across save/load.
//!
//! Two retrieval modes:
//!
//! - **collapsed** ([`LevelFilter::Collapsed`]): all levels at once, so one
//!   ranked list can surface a summary for a broad question and a leaf for a
//!   narrow one
//! - **traversal** ([`TreeIndex::traverse`]): start at the top level, keep
//!   the best nodes, descend into their children, repeat down to the leaves

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::hierarchy::{Node, NodeId, Tree};

/// Which nodes a query considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Only nodes at this level.
    Level(usize),
    /// Every node in the tree.
    Collapsed,
}

/// One ranked hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryResult {
    /// Matching node.
    pub node_id: NodeId,
    /// Cosine similarity to the query.
    pub score: f32,
}

#[derive(Debug)]
enum Source {
    Tree(Arc<Tree>),
    /// Leaves of a document whose tree could not be completed.
    Leaves(Vec<Node>),
}

/// Queryable index over one tree.
#[derive(Debug)]
pub struct TreeIndex {
    source: Source,
    dim: usize,
    /// Row-major unit vectors; row i belongs to node id i.
    vectors: Vec<f32>,
}

impl TreeIndex {
    /// Index every node of `tree`.
    pub fn new(tree: impl Into<Arc<Tree>>) -> Result<Self> {
        let tree = tree.into();
        let (dim, vectors) = normalize_rows(tree.nodes())?;
        Ok(Self {
            source: Source::Tree(tree),
            dim,
            vectors,
        })
    }

    /// Flat index over leaves only.
    ///
    /// Leaves must carry ids `0..n` in order, as the builder assigns them.
    pub fn leaf_only(leaves: Vec<Node>) -> Result<Self> {
        for (i, node) in leaves.iter().enumerate() {
            if node.id.index() != i || !node.is_leaf() {
                return Err(Error::InvalidInput(format!(
                    "leaf index expects leaves with ids 0..n, found {} at {i}",
                    node.id
                )));
            }
        }
        let (dim, vectors) = normalize_rows(&leaves)?;
        Ok(Self {
            source: Source::Leaves(leaves),
            dim,
            vectors,
        })
    }

    /// The indexed tree, unless this is a leaf-only index.
    pub fn tree(&self) -> Option<&Arc<Tree>> {
        match &self.source {
            Source::Tree(tree) => Some(tree),
            Source::Leaves(_) => None,
        }
    }

    /// True for the flat fallback index.
    pub fn is_leaf_only(&self) -> bool {
        matches!(self.source, Source::Leaves(_))
    }

    /// Indexed nodes, by id.
    pub fn nodes(&self) -> &[Node] {
        match &self.source {
            Source::Tree(tree) => tree.nodes(),
            Source::Leaves(leaves) => leaves,
        }
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes().get(id.index())
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Top `k` nodes by cosine similarity to `vector`.
    pub fn query(&self, vector: &[f32], filter: LevelFilter, k: usize) -> Result<Vec<QueryResult>> {
        let query = self.prepare(vector)?;
        let candidates: Vec<usize> = match filter {
            LevelFilter::Collapsed => (0..self.len()).collect(),
            LevelFilter::Level(level) => self
                .nodes()
                .iter()
                .filter(|n| n.level == level)
                .map(|n| n.id.index())
                .collect(),
        };
        Ok(self.rank(&query, &candidates, k))
    }

    /// Top-down traversal keeping `k` nodes per level.
    ///
    /// Starts from the top level, keeps the best `k`, then ranks only the
    /// children of the kept nodes, down to the leaves. Returns every kept
    /// node, best first.
    pub fn traverse(&self, vector: &[f32], k: usize) -> Result<Vec<QueryResult>> {
        let query = self.prepare(vector)?;
        let mut candidates: Vec<usize> = match &self.source {
            Source::Tree(tree) => tree
                .levels()
                .last()
                .into_iter()
                .flatten()
                .map(|id| id.index())
                .collect(),
            Source::Leaves(leaves) => (0..leaves.len()).collect(),
        };

        let mut selected = Vec::new();
        while !candidates.is_empty() && k > 0 {
            let kept = self.rank(&query, &candidates, k);
            let children: BTreeSet<usize> = kept
                .iter()
                .filter_map(|r| self.node(r.node_id))
                .flat_map(|n| n.children.iter().map(|c| c.index()))
                .collect();
            selected.extend(kept);
            candidates = children.into_iter().collect();
        }
        sort_results(&mut selected);
        Ok(selected)
    }

    /// Unit-normalize a query vector after checking it is usable.
    fn prepare(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if self.is_empty() {
            return Err(Error::Query("index is empty".into()));
        }
        if vector.len() != self.dim {
            return Err(Error::Query(format!(
                "query has {} dims, index has {}",
                vector.len(),
                self.dim
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::Query("query vector has non-finite values".into()));
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(Error::Query("query vector is zero".into()));
        }
        Ok(vector.iter().map(|x| x / norm).collect())
    }

    fn rank(&self, query: &[f32], candidates: &[usize], k: usize) -> Vec<QueryResult> {
        let score = |&i: &usize| QueryResult {
            node_id: NodeId::from_index(i),
            score: dot(query, &self.vectors[i * self.dim..(i + 1) * self.dim]),
        };

        #[cfg(feature = "parallel")]
        let mut results: Vec<QueryResult> = candidates.par_iter().map(score).collect();
        #[cfg(not(feature = "parallel"))]
        let mut results: Vec<QueryResult> = candidates.iter().map(score).collect();

        sort_results(&mut results);
        results.truncate(k);
        results
    }
}

fn sort_results(results: &mut [QueryResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize_rows(nodes: &[Node]) -> Result<(usize, Vec<f32>)> {
    let dim = nodes.first().map(|n| n.embedding.len()).ok_or(Error::EmptyInput)?;
    let mut out = Vec::with_capacity(nodes.len() * dim);
    for node in nodes {
        if node.embedding.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: node.embedding.len(),
            });
        }
        let norm = node.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        let scale = if norm > 0.0 { 1.0 / norm } else { 0.0 };
        out.extend(node.embedding.iter().map(|x| x * scale));
    }
    Ok((dim, out))
}

/// Shared slot holding the index queries currently run against.
///
/// Readers take a cheap `Arc` clone; [`IndexHandle::publish`] swaps in a
/// rebuilt index without disturbing queries already running on the old one.
#[derive(Debug)]
pub struct IndexHandle {
    slot: RwLock<Arc<TreeIndex>>,
}

impl IndexHandle {
    /// Wrap an initial index.
    pub fn new(index: impl Into<Arc<TreeIndex>>) -> Self {
        Self {
            slot: RwLock::new(index.into()),
        }
    }

    /// Index to query now.
    pub fn current(&self) -> Arc<TreeIndex> {
        let guard = self.slot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the index, returning the previous one.
    pub fn publish(&self, index: impl Into<Arc<TreeIndex>>) -> Arc<TreeIndex> {
        let mut guard = self.slot.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, index.into())
    }
}
