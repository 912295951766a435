//! Clustering of embedding vectors ahead of summarization.
//!
//! Chunks rarely belong to one topic. A passage on crop yields under
//! drought is about agriculture and about climate, so the engine fits a
//! soft model: every vector gets a probability per cluster and joins each
//! cluster whose probability clears a threshold. The highest one is its
//! primary cluster, which decides its single parent in the tree.
//!
//! ## Pipeline
//!
//! ```text
//! vectors ──► RandomProjection ──► Gmm (k = lo..=hi) ──► min BIC ──► threshold
//!               (normalize, d→m)     (k-means init)                   (soft sets)
//! ```
//!
//! [`ClusterEngine`] runs the whole pipeline; [`Gmm`] and [`Kmeans`] are usable
//! on their own.
//!
//! ## Usage
//!
//! ```rust
//! use docraptor::cluster::{Clustering, Gmm, Kmeans, SoftClustering};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2).with_seed(1).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! let probs = Gmm::new()
//!     .with_n_components(2)
//!     .with_seed(1)
//!     .fit_predict_proba(&data)
//!     .unwrap();
//! // probs[i][k] = P(point i belongs to cluster k)
//! assert_eq!(probs.len(), 4);
//! ```

mod engine;
mod gmm;
mod kmeans;
mod reduce;
mod traits;

pub use engine::{ClusterAssignment, ClusterConfig, ClusterEngine};
pub use gmm::Gmm;
pub use kmeans::{Kmeans, KmeansFit};
pub use reduce::RandomProjection;
pub use traits::{Clustering, MixtureFit, SoftClustering};

use ndarray::Array2;

use crate::error::{Error, Result};

/// Copy row vectors into an `n x d` matrix, checking they share a width.
pub(crate) fn to_array(data: &[Vec<f32>]) -> Result<Array2<f64>> {
    let first = data.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    if d == 0 {
        return Err(Error::InvalidInput("zero-dimensional vectors".into()));
    }
    let mut flat = Vec::with_capacity(data.len() * d);
    for row in data {
        if row.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: row.len(),
            });
        }
        flat.extend(row.iter().map(|&x| f64::from(x)));
    }
    Array2::from_shape_vec((data.len(), d), flat).map_err(|e| Error::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_array_checks_shape() {
        let arr = to_array(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(arr.shape(), &[2, 2]);
        assert_eq!(arr[[1, 0]], 3.0);
        assert!(matches!(to_array(&[]), Err(Error::EmptyInput)));
        assert!(matches!(
            to_array(&[vec![1.0], vec![1.0, 2.0]]),
            Err(Error::DimensionMismatch {
                expected: 1,
                found: 2
            })
        ));
    }
}
