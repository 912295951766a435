//! Diagonal-covariance Gaussian mixture fitted by EM.
//!
//! The mixture gives each point a probability for every component, which
//! is what lets one chunk sit under several summaries:
//!
//! ```text
//! p(x) = Σₖ πₖ · N(x | μₖ, diag(σ²ₖ))
//! γᵢₖ  = πₖ · N(xᵢ | μₖ, σ²ₖ) / p(xᵢ)          (E-step)
//! μₖ   = Σᵢ γᵢₖ xᵢ / Σᵢ γᵢₖ                      (M-step)
//! σ²ₖ  = Σᵢ γᵢₖ (xᵢ - μₖ)² / Σᵢ γᵢₖ + reg
//! πₖ   = Σᵢ γᵢₖ / n
//! ```
//!
//! Diagonal covariances keep the parameter count at `2kd + k - 1`, small
//! enough for BIC to be meaningful on a few dozen projected points.
//!
//! EM starts from seeded k-means cells and stops when the mean per-point
//! log-likelihood moves by less than `tol`. `reg_covar` is added to every
//! variance so a component that shrinks onto one point stays finite.

use ndarray::{Array1, Array2, Axis};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::kmeans::Kmeans;
use super::to_array;
use super::traits::{Clustering, MixtureFit, SoftClustering};
use crate::error::{Error, Result};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Gaussian mixture settings.
#[derive(Debug, Clone)]
pub struct Gmm {
    n_components: usize,
    max_iter: usize,
    tol: f64,
    seed: u64,
    reg_covar: f64,
}

/// Component parameters during EM.
struct Components {
    means: Array2<f64>,
    variances: Array2<f64>,
    weights: Array1<f64>,
}

impl Components {
    /// `ln πₖ - ½ (d ln 2π + Σ ln σ²ₖ)` per component.
    fn log_constants(&self) -> Array1<f64> {
        let d = self.means.ncols() as f64;
        Array1::from_iter(
            self.variances
                .axis_iter(Axis(0))
                .zip(self.weights.iter())
                .map(|(var, &w)| w.ln() - 0.5 * (d * LN_2PI + var.mapv(f64::ln).sum())),
        )
    }
}

impl Gmm {
    /// Eight components, 100 iterations, tolerance 1e-3, seed 0.
    pub fn new() -> Self {
        Self {
            n_components: 8,
            max_iter: 100,
            tol: 1e-3,
            seed: 0,
            reg_covar: 1e-6,
        }
    }

    /// Set the component count.
    pub fn with_n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    /// Set maximum EM iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the log-likelihood tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the variance floor.
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on an `n x d` matrix.
    ///
    /// More components than points are capped at `n`.
    pub fn fit(&self, data: &Array2<f64>) -> Result<MixtureFit> {
        let (n, d) = data.dim();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.n_components == 0 {
            return Err(Error::InvalidParameter {
                name: "n_components",
                message: "must be > 0",
            });
        }
        let k = self.n_components.min(n);

        let mut params = self.initial(data, k)?;
        let (mut resp, mut total_ll) = e_step(data, &params);
        let mut previous = f64::NEG_INFINITY;
        let mut iterations = 0;

        while iterations < self.max_iter {
            let mean_ll = total_ll / n as f64;
            if (mean_ll - previous).abs() < self.tol {
                break;
            }
            previous = mean_ll;
            iterations += 1;

            self.m_step(data, &resp, &mut params);
            (resp, total_ll) = e_step(data, &params);
        }

        if !total_ll.is_finite() {
            return Err(Error::InvalidInput(
                "mixture log-likelihood is not finite".into(),
            ));
        }

        Ok(MixtureFit {
            responsibilities: resp.outer_iter().map(|r| r.to_vec()).collect(),
            log_likelihood: total_ll,
            n_parameters: 2 * k * d + (k - 1),
            n_samples: n,
            iterations,
        })
    }

    /// Means from k-means, per-cell variances (the global variance for
    /// cells of fewer than two points), weights from cell sizes.
    fn initial(&self, data: &Array2<f64>, k: usize) -> Result<Components> {
        let cells = Kmeans::new(k)
            .with_max_iter(50)
            .with_seed(self.seed)
            .fit(data)?;

        let global_var = data.var_axis(Axis(0), 0.0);
        let mut sizes = vec![0usize; k];
        let mut variances = Array2::<f64>::zeros((k, data.ncols()));
        for (row, &c) in data.axis_iter(Axis(0)).zip(&cells.labels) {
            let diff = &row - &cells.centroids.row(c);
            variances.row_mut(c).scaled_add(1.0, &diff.mapv(|x| x * x));
            sizes[c] += 1;
        }
        for (c, mut var) in variances.axis_iter_mut(Axis(0)).enumerate() {
            if sizes[c] >= 2 {
                var /= sizes[c] as f64;
            } else {
                var.assign(&global_var);
            }
            var.mapv_inplace(|x| x.max(self.reg_covar) + self.reg_covar);
        }

        let weights = Array1::from_iter(sizes.iter().map(|&s| s.max(1) as f64));
        let weights = &weights / weights.sum();

        Ok(Components {
            means: cells.centroids,
            variances,
            weights,
        })
    }

    fn m_step(&self, data: &Array2<f64>, resp: &Array2<f64>, params: &mut Components) {
        let mass = resp.sum_axis(Axis(0));
        let total = mass.sum();

        for c in 0..params.means.nrows() {
            params.weights[c] = (mass[c] / total).max(f64::MIN_POSITIVE);
            if mass[c] <= 1e-10 {
                // Dead component: keep its previous parameters.
                continue;
            }
            let gamma = resp.column(c);
            let mean = gamma.dot(data) / mass[c];
            let centred = data - &mean;
            let var = gamma.dot(&centred.mapv(|x| x * x)) / mass[c] + self.reg_covar;
            params.means.row_mut(c).assign(&mean);
            params.variances.row_mut(c).assign(&var);
        }

        let norm = params.weights.sum();
        params.weights /= norm;
    }
}

/// Log of `Σ exp(values)` without overflow.
fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Responsibilities and total log-likelihood.
fn e_step(data: &Array2<f64>, params: &Components) -> (Array2<f64>, f64) {
    let n = data.nrows();
    let k = params.means.nrows();
    let constants = params.log_constants();
    let precisions = params.variances.mapv(|v| 1.0 / v);

    let row = |i: usize| -> (Vec<f64>, f64) {
        let point = data.row(i);
        let log_probs: Vec<f64> = (0..k)
            .map(|c| {
                let diff = &point - &params.means.row(c);
                let mahalanobis = (&diff * &diff * &precisions.row(c)).sum();
                constants[c] - 0.5 * mahalanobis
            })
            .collect();
        let norm = logsumexp(&log_probs);
        (log_probs.iter().map(|lp| (lp - norm).exp()).collect(), norm)
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<(Vec<f64>, f64)> = (0..n).into_par_iter().map(row).collect();
    #[cfg(not(feature = "parallel"))]
    let rows: Vec<(Vec<f64>, f64)> = (0..n).map(row).collect();

    let mut resp = Array2::zeros((n, k));
    let mut total = 0.0;
    for (i, (probs, norm)) in rows.into_iter().enumerate() {
        resp.row_mut(i).assign(&Array1::from(probs));
        total += norm;
    }
    (resp, total)
}

impl Default for Gmm {
    fn default() -> Self {
        Self::new()
    }
}

impl Clustering for Gmm {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self
            .fit_predict_proba(data)?
            .iter()
            .map(|probs| {
                probs
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map_or(0, |(c, _)| c)
            })
            .collect())
    }

    fn n_clusters(&self) -> usize {
        self.n_components
    }
}

impl SoftClustering for Gmm {
    fn fit_predict_proba(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f64>>> {
        Ok(self.fit(&to_array(data)?)?.responsibilities)
    }
}
