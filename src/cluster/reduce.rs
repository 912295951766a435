//! Dimensionality reduction ahead of mixture fitting.
//!
//! Embeddings are a few hundred to a few thousand dimensions wide; a mixture
//! model over that many dimensions with a handful of points is hopelessly
//! underdetermined. Points are first L2-normalized (so Euclidean distance
//! tracks cosine distance) and then projected through a seeded Gaussian
//! random matrix:
//!
//! ```text
//! y = x · R,   R ∈ ℝ^{d×m},   Rᵢⱼ ~ N(0, 1/m)
//! ```
//!
//! By Johnson-Lindenstrauss, pairwise distances (hence neighbourhoods) are
//! preserved up to a small distortion. The reduced vectors are used for
//! clustering only; stored embeddings keep their full dimension.

use ndarray::Array2;
use rand::prelude::*;
use rand_distr::Normal;

use super::to_array;
use crate::error::{Error, Result};

/// Seeded Gaussian random projection.
#[derive(Debug, Clone)]
pub struct RandomProjection {
    target_dim: usize,
    seed: u64,
}

impl RandomProjection {
    /// Project to `target_dim` dimensions.
    pub fn new(target_dim: usize, seed: u64) -> Self {
        Self { target_dim, seed }
    }

    /// Target dimension.
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    /// Normalize and project `data` (`n x d`) to `n x min(d, target_dim)`.
    pub fn project(&self, data: &[Vec<f32>]) -> Result<Array2<f64>> {
        if self.target_dim == 0 {
            return Err(Error::InvalidParameter {
                name: "target_dim",
                message: "must be > 0",
            });
        }
        let mut arr = to_array(data)?;
        for mut row in arr.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row /= norm;
            }
        }

        let d = arr.ncols();
        if d <= self.target_dim {
            return Ok(arr);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let normal = Normal::new(0.0, 1.0 / (self.target_dim as f64).sqrt())
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let r = Array2::from_shape_fn((d, self.target_dim), |_| normal.sample(&mut rng));
        Ok(arr.dot(&r))
    }
}
