//! Principal coordinates analysis (classical multidimensional scaling).
//!
//! Gower double-centering of the squared distance matrix followed by a
//! symmetric eigendecomposition. Coordinates are the eigenvectors scaled by
//! the square root of their (non-negative) eigenvalues; the proportion
//! explained per axis is its eigenvalue over the sum of positive eigenvalues.

use crate::error::{AppError, Result};
use crate::matrix::DistanceMatrix;
use nalgebra::{DMatrix, SymmetricEigen};
use std::collections::HashMap;

/// PCoA ordination result, sample order matching the input matrix.
#[derive(Debug, Clone)]
pub struct PcoaResult {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    /// Per-sample coordinates, one inner vec of `n_axes` values per sample.
    pub coordinates: Vec<Vec<f64>>,
    /// Retained eigenvalues, descending.
    pub eigenvalues: Vec<f64>,
    /// Proportion of variance explained per retained axis.
    pub proportion_explained: Vec<f64>,
}

impl PcoaResult {
    /// Sample names in coordinate order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of retained axes.
    pub fn n_axes(&self) -> usize {
        self.proportion_explained.len()
    }

    /// Coordinate of a sample on a given axis (0 = PC1).
    pub fn coordinate(&self, sample: &str, axis: usize) -> Result<f64> {
        let i = *self
            .index
            .get(sample)
            .ok_or_else(|| AppError::UnknownSample(sample.to_string()))?;
        self.coordinates[i].get(axis).copied().ok_or_else(|| {
            AppError::Pcoa(format!(
                "axis {} not retained (only {} axes computed)",
                axis + 1,
                self.n_axes()
            ))
        })
    }
}

/// Run PCoA on a distance matrix, retaining up to `n_axes` axes
/// (clamped to n-1). The input is assumed pre-transformed; no further
/// transformation is applied.
pub fn pcoa(dist: &DistanceMatrix, n_axes: usize) -> Result<PcoaResult> {
    let n = dist.n();
    if n < 2 {
        return Err(AppError::Pcoa("requires at least 2 samples".to_string()));
    }
    let k = n_axes.min(n - 1);
    let n_f = n as f64;

    // Squared distances, then Gower double-centering:
    // B = -0.5 * (D^2 - row_means - col_means + grand_mean)
    let d_sq = DMatrix::from_fn(n, n, |i, j| {
        let d = dist.get_by_index(i, j);
        d * d
    });
    let mut row_means = vec![0.0; n];
    for i in 0..n {
        row_means[i] = d_sq.row(i).sum() / n_f;
    }
    let grand_mean: f64 = row_means.iter().sum::<f64>() / n_f;
    let centered = DMatrix::from_fn(n, n, |i, j| {
        -0.5 * (d_sq[(i, j)] - row_means[i] - row_means[j] + grand_mean)
    });

    let eigen = SymmetricEigen::new(centered);

    // Eigenpairs sorted by descending eigenvalue.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let sorted_vals: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();

    // Negative eigenvalues (non-Euclidean input) contribute nothing.
    let positive_sum: f64 = sorted_vals.iter().filter(|&&v| v > 0.0).sum();
    let proportion_explained: Vec<f64> = sorted_vals[..k]
        .iter()
        .map(|&v| {
            if positive_sum > 0.0 {
                v.max(0.0) / positive_sum
            } else {
                0.0
            }
        })
        .collect();

    let mut coordinates = vec![vec![0.0; k]; n];
    for (axis, &col) in order[..k].iter().enumerate() {
        let scale = sorted_vals[axis].max(0.0).sqrt();
        for sample in 0..n {
            coordinates[sample][axis] = eigen.eigenvectors[(sample, col)] * scale;
        }
    }

    let labels: Vec<String> = dist.labels().to_vec();
    let index = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.clone(), i))
        .collect();
    Ok(PcoaResult {
        labels,
        index,
        coordinates,
        eigenvalues: sorted_vals[..k].to_vec(),
        proportion_explained,
    })
}
