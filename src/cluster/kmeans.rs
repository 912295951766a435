//! Seeded k-means, used to start the Gaussian mixture.
//!
//! Lloyd iterations from a k-means++ start. EM begun from these centroids
//! needs fewer iterations and is less prone to bad local optima than EM
//! begun from random points.
//!
//! Every run is seeded: the same points and seed always give the same
//! centroids, which keeps tree builds reproducible.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::to_array;
use super::traits::Clustering;
use crate::error::{Error, Result};

/// K-means settings.
#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    max_iter: usize,
    /// Stop once the summed squared centroid movement falls below this.
    tol: f64,
    seed: u64,
}

/// Fitted centroids and hard labels.
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// `k x d` centroid matrix.
    pub centroids: Array2<f64>,
    /// Label per input row.
    pub labels: Vec<usize>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
    /// Lloyd iterations run.
    pub iterations: usize,
}

impl Kmeans {
    /// `k` clusters, seed 0.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            tol: 1e-4,
            seed: 0,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the movement tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on an `n x d` matrix.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KmeansFit> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be in 1..=n_points",
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = plus_plus(data, self.k, &mut rng);
        let mut labels = assign(data, &centroids);
        let mut iterations = 0;

        while iterations < self.max_iter {
            iterations += 1;
            let updated = self.update(data, &labels, &centroids);
            let movement = (&updated - &centroids).mapv(|x| x * x).sum();
            centroids = updated;
            labels = assign(data, &centroids);
            if movement < self.tol {
                break;
            }
        }

        let inertia = labels
            .iter()
            .enumerate()
            .map(|(i, &c)| sq_dist(&data.row(i), &centroids.row(c)))
            .sum();
        Ok(KmeansFit {
            centroids,
            labels,
            inertia,
            iterations,
        })
    }

    /// Cell means. An empty cell takes the point farthest from its own
    /// centroid, so no centroid is left stranded.
    fn update(&self, data: &Array2<f64>, labels: &[usize], old: &Array2<f64>) -> Array2<f64> {
        let mut sums = Array2::<f64>::zeros(old.raw_dim());
        let mut counts = vec![0usize; self.k];
        for (row, &c) in data.axis_iter(Axis(0)).zip(labels) {
            sums.row_mut(c).scaled_add(1.0, &row);
            counts[c] += 1;
        }

        let mut taken: Vec<usize> = Vec::new();
        for c in 0..self.k {
            if counts[c] > 0 {
                sums.row_mut(c).mapv_inplace(|x| x / counts[c] as f64);
                continue;
            }
            let far = (0..data.nrows())
                .filter(|i| !taken.contains(i))
                .map(|i| (i, sq_dist(&data.row(i), &old.row(labels[i]))))
                .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            taken.push(far);
            sums.row_mut(c).assign(&data.row(far));
        }
        sums
    }
}

/// k-means++: first centre uniform, each next one drawn with probability
/// proportional to the squared distance to the nearest chosen centre.
fn plus_plus(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    centroids
        .row_mut(0)
        .assign(&data.row(rng.random_range(0..n)));

    let mut nearest: Array1<f64> = data
        .axis_iter(Axis(0))
        .map(|row| sq_dist(&row, &centroids.row(0)))
        .collect();

    for c in 1..k {
        let total = nearest.sum();
        let pick = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            nearest
                .iter()
                .position(|&d| {
                    acc += d;
                    acc >= target
                })
                .unwrap_or(n - 1)
        } else {
            // All remaining points coincide with a centre.
            rng.random_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(pick));
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            nearest[i] = nearest[i].min(sq_dist(&row, &centroids.row(c)));
        }
    }
    centroids
}

fn assign(data: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    let closest = |i: usize| {
        let point = data.row(i);
        centroids
            .axis_iter(Axis(0))
            .map(|c| sq_dist(&point, &c))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
            .unwrap_or(0)
    };

    #[cfg(feature = "parallel")]
    let labels = (0..data.nrows()).into_par_iter().map(closest).collect();
    #[cfg(not(feature = "parallel"))]
    let labels = (0..data.nrows()).map(closest).collect();
    labels
}

fn sq_dist(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
    let diff = a - b;
    diff.dot(&diff)
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(&to_array(data)?)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}
