//! Soft clustering of one tree level with automatic cluster-count selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gmm::Gmm;
use super::reduce::RandomProjection;
use super::traits::MixtureFit;
use crate::error::{Error, Result};

/// Cluster engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Smallest cluster count considered.
    pub min_clusters: usize,
    /// Largest cluster count considered.
    pub max_clusters: usize,
    /// Membership probability above which a node joins a cluster.
    pub membership_threshold: f64,
    /// Width of the projected space the mixture is fitted in.
    pub reduced_dimension: usize,
    /// Seed for projection and mixture initialisation.
    pub seed: u64,
    /// Maximum EM iterations per candidate count.
    pub max_iter: usize,
    /// EM convergence tolerance.
    pub tol: f64,
    /// Variance floor added to every component.
    pub reg_covar: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_clusters: 1,
            max_clusters: 50,
            membership_threshold: 0.1,
            reduced_dimension: 10,
            seed: 224,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
        }
    }
}

/// Soft cluster memberships for one pass.
///
/// Every node belongs to at least one cluster; `primary` is its most
/// probable one. Labels are dense (`0..n_clusters`) and every label has at
/// least one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    memberships: Vec<BTreeSet<usize>>,
    primary: Vec<usize>,
    n_clusters: usize,
}

impl ClusterAssignment {
    /// Everything in one cluster.
    pub fn single(n: usize) -> Self {
        Self {
            memberships: (0..n).map(|_| BTreeSet::from([0])).collect(),
            primary: vec![0; n],
            n_clusters: usize::from(n > 0),
        }
    }

    /// Threshold a membership-probability matrix.
    ///
    /// A node joins every cluster whose probability exceeds `threshold`,
    /// and always its most probable cluster. Unused labels are dropped and
    /// the rest renumbered in ascending order.
    pub fn from_probabilities(probs: &[Vec<f64>], threshold: f64) -> Self {
        let mut memberships = Vec::with_capacity(probs.len());
        let mut primary = Vec::with_capacity(probs.len());
        for row in probs {
            let mut best = 0;
            for (c, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = c;
                }
            }
            let mut set: BTreeSet<usize> = row
                .iter()
                .enumerate()
                .filter(|(_, &p)| p > threshold)
                .map(|(c, _)| c)
                .collect();
            set.insert(best);
            memberships.push(set);
            primary.push(best);
        }

        let used: BTreeSet<usize> = memberships.iter().flatten().copied().collect();
        let remap = |label: usize| used.range(..label).count();
        let memberships: Vec<BTreeSet<usize>> = memberships
            .into_iter()
            .map(|set| set.into_iter().map(remap).collect())
            .collect();
        let primary = primary.into_iter().map(remap).collect();

        Self {
            memberships,
            primary,
            n_clusters: used.len(),
        }
    }

    /// Number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Number of clustered nodes.
    pub fn len(&self) -> usize {
        self.memberships.len()
    }

    /// Whether no nodes were clustered.
    pub fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }

    /// True when the pass collapsed everything into one group.
    pub fn is_single(&self) -> bool {
        self.n_clusters == 1
    }

    /// Clusters node `i` belongs to.
    pub fn memberships(&self, i: usize) -> &BTreeSet<usize> {
        &self.memberships[i]
    }

    /// Most probable cluster of node `i`.
    pub fn primary(&self, i: usize) -> usize {
        self.primary[i]
    }

    /// Member indices per cluster, ascending.
    pub fn clusters(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n_clusters];
        for (i, set) in self.memberships.iter().enumerate() {
            for &c in set {
                out[c].push(i);
            }
        }
        out
    }
}

/// Groups embedding vectors into soft clusters.
///
/// 1. project to a low dimension ([`RandomProjection`])
/// 2. fit a Gaussian mixture for each candidate count k
/// 3. keep the k with the lowest BIC (ties go to the smaller k)
/// 4. threshold the memberships ([`ClusterAssignment::from_probabilities`])
#[derive(Debug, Clone, Default)]
pub struct ClusterEngine {
    config: ClusterConfig,
}

impl ClusterEngine {
    /// Create an engine.
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster with the configured bounds.
    pub fn cluster_level(&self, vectors: &[Vec<f32>]) -> Result<ClusterAssignment> {
        self.cluster(vectors, self.config.min_clusters, self.config.max_clusters)
    }

    /// Cluster `vectors` into between `min_clusters` and `max_clusters`
    /// soft clusters.
    ///
    /// Fewer vectors than `min_clusters` collapse into one cluster. The
    /// upper bound is additionally capped at `n / 2`, so a pass always at
    /// least halves the level; when that leaves no admissible count the
    /// level also collapses into one cluster.
    pub fn cluster(
        &self,
        vectors: &[Vec<f32>],
        min_clusters: usize,
        max_clusters: usize,
    ) -> Result<ClusterAssignment> {
        if vectors.is_empty() {
            return Err(Error::EmptyInput);
        }
        if min_clusters > max_clusters {
            return Err(Error::InvalidParameter {
                name: "min_clusters",
                message: "must not exceed max_clusters",
            });
        }

        let dim = vectors[0].len();
        if let Some(row) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: row.len(),
            });
        }

        let n = vectors.len();
        let lo = min_clusters.max(1);
        let hi = max_clusters.min(n / 2);
        if n < min_clusters || hi < lo || hi <= 1 {
            debug!(n, lo, hi, "level collapses into a single cluster");
            return Ok(ClusterAssignment::single(n));
        }

        let reduced = RandomProjection::new(self.config.reduced_dimension, self.config.seed)
            .project(vectors)?;

        let mut best: Option<(usize, MixtureFit)> = None;
        for k in lo..=hi {
            let fit = Gmm::new()
                .with_n_components(k)
                .with_seed(self.config.seed)
                .with_max_iter(self.config.max_iter)
                .with_tol(self.config.tol)
                .with_reg_covar(self.config.reg_covar)
                .fit(&reduced)?;
            let better = match &best {
                Some((_, current)) => fit.bic() < current.bic(),
                None => true,
            };
            if better {
                best = Some((k, fit));
            }
        }

        let (k, fit) = best.ok_or(Error::EmptyInput)?;
        let assignment =
            ClusterAssignment::from_probabilities(&fit.responsibilities, self.config.membership_threshold);
        debug!(
            n,
            chosen_k = k,
            clusters = assignment.n_clusters(),
            bic = fit.bic(),
            "clustered level"
        );
        Ok(assignment)
    }
}
