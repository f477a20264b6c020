//! Classical (Torgerson) multidimensional scaling.
//!
//! Projects a distance matrix into coordinates whose pairwise Euclidean
//! distances reproduce the input as closely as the retained dimensions allow.
//! Used to lay out strategies by return similarity.

use nalgebra::{DMatrix, SymmetricEigen};
use thiserror::Error;
use tracing::debug;

/// Eigenvalues at or below this are treated as zero.
pub const EIGENVALUE_EPSILON: f64 = 1e-9;

/// Columns of the all-zero result returned for degenerate input.
const DEGENERATE_DIMS: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum MdsError {
    #[error("distance matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("distance matrix entry ({row}, {col}) is not a finite non-negative number")]
    InvalidEntry { row: usize, col: usize },

    #[error("distance matrix is not symmetric at ({row}, {col})")]
    Asymmetric { row: usize, col: usize },
}

/// Scale a row-major distance matrix. Returns one row of coordinates per input row.
pub fn scale(distances: &[Vec<f64>]) -> Result<DMatrix<f64>, MdsError> {
    let n = distances.len();
    if let Some(row) = distances.iter().find(|r| r.len() != n) {
        return Err(MdsError::NotSquare {
            rows: n,
            cols: row.len(),
        });
    }
    scale_matrix(&DMatrix::from_fn(n, n, |i, j| distances[i][j]))
}

pub fn scale_matrix(distances: &DMatrix<f64>) -> Result<DMatrix<f64>, MdsError> {
    validate(distances)?;
    let n = distances.nrows();
    if n == 0 {
        return Ok(DMatrix::zeros(0, DEGENERATE_DIMS));
    }

    let b = double_center(&distances.map(|d| d * d));
    let eigen = SymmetricEigen::new(b);

    let mut order: Vec<usize> = (0..n)
        .filter(|&k| eigen.eigenvalues[k] > EIGENVALUE_EPSILON)
        .collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if order.is_empty() {
        debug!(n, "no positive eigenvalues, returning zero coordinates");
        return Ok(DMatrix::zeros(n, DEGENERATE_DIMS));
    }

    let mut coords = DMatrix::zeros(n, order.len());
    for (out, &k) in order.iter().enumerate() {
        let factor = eigen.eigenvalues[k].sqrt();
        let column = eigen.eigenvectors.column(k) * factor;
        let sign = largest_magnitude_sign(column.as_slice());
        for i in 0..n {
            coords[(i, out)] = column[i] * sign;
        }
    }
    Ok(coords)
}

/// First two coordinates of every row, zero-padded when fewer dimensions were retained.
pub fn to_2d(coords: &DMatrix<f64>) -> Vec<(f64, f64)> {
    let pick = |i: usize, k: usize| if k < coords.ncols() { coords[(i, k)] } else { 0.0 };
    (0..coords.nrows()).map(|i| (pick(i, 0), pick(i, 1))).collect()
}

/// Correlation to distance: `sqrt(2 * (1 - rho))`.
pub fn correlation_distance(rho: f64) -> f64 {
    (2.0 * (1.0 - rho.clamp(-1.0, 1.0))).sqrt()
}

fn validate(distances: &DMatrix<f64>) -> Result<(), MdsError> {
    let (rows, cols) = distances.shape();
    if rows != cols {
        return Err(MdsError::NotSquare { rows, cols });
    }
    for i in 0..rows {
        for j in 0..cols {
            let d = distances[(i, j)];
            if !d.is_finite() || d < 0.0 {
                return Err(MdsError::InvalidEntry { row: i, col: j });
            }
            if (d - distances[(j, i)]).abs() > 1e-9 * d.abs().max(1.0) {
                return Err(MdsError::Asymmetric { row: i, col: j });
            }
        }
    }
    Ok(())
}

/// `B = -1/2 * J * D² * J` with `J = I - 11ᵀ/n`.
fn double_center(squared: &DMatrix<f64>) -> DMatrix<f64> {
    let n = squared.nrows();
    let nf = n as f64;
    let row_means: Vec<f64> = (0..n).map(|i| squared.row(i).sum() / nf).collect();
    let col_means: Vec<f64> = (0..n).map(|j| squared.column(j).sum() / nf).collect();
    let grand = row_means.iter().sum::<f64>() / nf;
    DMatrix::from_fn(n, n, |i, j| {
        -0.5 * (squared[(i, j)] - row_means[i] - col_means[j] + grand)
    })
}

/// +1 if the largest-magnitude element is non-negative, else -1.
fn largest_magnitude_sign(values: &[f64]) -> f64 {
    let mut best = 0.0_f64;
    for &v in values {
        if v.abs() > best.abs() {
            best = v;
        }
    }
    if best < 0.0 {
        -1.0
    } else {
        1.0
    }
}
