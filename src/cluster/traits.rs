//! Clustering traits.

use crate::error::Result;

/// Hard clustering: one label per point.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input point.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>>;

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}

/// Soft clustering: a probability distribution over clusters per point.
pub trait SoftClustering: Clustering {
    /// Fit and return soft cluster assignments (probabilities).
    ///
    /// Returns a matrix where entry \[i\]\[k\] is the probability that
    /// point i belongs to cluster k.
    fn fit_predict_proba(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f64>>>;
}

/// Outcome of fitting a probabilistic mixture, used for model selection.
#[derive(Debug, Clone)]
pub struct MixtureFit {
    /// `responsibilities[i][k]` = P(component k | point i).
    pub responsibilities: Vec<Vec<f64>>,
    /// Total log-likelihood of the data under the fitted model.
    pub log_likelihood: f64,
    /// Free parameters of the model.
    pub n_parameters: usize,
    /// Points the model was fitted on.
    pub n_samples: usize,
    /// EM iterations run.
    pub iterations: usize,
}

impl MixtureFit {
    /// Bayesian information criterion: `-2 ln L + p ln n`. Lower is better.
    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood + self.n_parameters as f64 * (self.n_samples as f64).ln()
    }

    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.responsibilities.first().map(Vec::len).unwrap_or(0)
    }
}
