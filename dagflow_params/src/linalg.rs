// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small dependency-free dense linear algebra kernels, flat row-major `Vec<f64>` throughout.
//!
//! Grounded in `execution_tape`'s preference for hand-rolled numeric kernels over pulling in
//! `nalgebra`/`ndarray` for a handful of small fixed operations (`aggregates.rs`, `reg_value.rs`);
//! here the operations are Cholesky decomposition and triangular solves instead of tape
//! aggregation, but the "just write the loops" stance carries over (see `SPEC_FULL.md`
//! "Dependency stack").

use crate::error::ParamsError;

/// Lower-triangular Cholesky factor `L` of a symmetric positive-definite `n x n` matrix `v`,
/// such that `L L^T = V` (Cholesky-Banachiewicz, row by row).
///
/// Grounded in `examples/original_source/dagflow/lib/linalg/cholesky.py`'s `_fcn_square`
/// (there delegated to `scipy.linalg.cholesky(lower=True)`; reimplemented here by hand since
/// `dagflow_params` carries no numeric dependency beyond `dagflow_core`).
pub fn cholesky_lower(v: &[f64], n: usize) -> Result<Vec<f64>, ParamsError> {
    if v.len() != n * n {
        return Err(ParamsError::matrix("covariance matrix is not square"));
    }
    let mut l = vec![0.0_f64; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = v[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(ParamsError::matrix(
                        "covariance matrix is not positive-definite",
                    ));
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Ok(l)
}

/// Elementwise `sqrt` of a diagonal's variances, used when a `GaussianConstraint` has no
/// cross-correlation (spec §9 supplement (4), the "sigma-only" construction path skips Cholesky
/// entirely since `L` for a diagonal covariance is itself diagonal with `L_ii = sqrt(V_ii)`).
pub fn cholesky_diagonal(sigma: &[f64]) -> Vec<f64> {
    sigma.iter().map(|&s| s.abs()).collect()
}

/// Solves `L z = rhs` for `z` by forward substitution, where `l` is `n x n` lower-triangular
/// (`solve_triangular(lower=True)` in
/// `examples/original_source/dagflow/lib/statistics/normalize_correlated_vars_two_ways.py`).
pub fn solve_lower_triangular(l: &[f64], n: usize, rhs: &[f64]) -> Vec<f64> {
    let mut z = vec![0.0_f64; n];
    for i in 0..n {
        let mut sum = rhs[i];
        for k in 0..i {
            sum -= l[i * n + k] * z[k];
        }
        z[i] = sum / l[i * n + i];
    }
    z
}

/// `y = L x` for lower-triangular `L` (`n x n`) and vector `x` (the backward direction of
/// `NormalizeCorrelatedVarsTwoWays`).
pub fn matvec_lower(l: &[f64], n: usize, x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0_f64; n];
    for i in 0..n {
        let mut sum = 0.0;
        for k in 0..=i {
            sum += l[i * n + k] * x[k];
        }
        y[i] = sum;
    }
    y
}

/// `diag(sigma) . c . diag(sigma)`, building a covariance matrix from a correlation matrix and
/// per-parameter standard deviations (spec §9 supplement (4), grounded in
/// `examples/original_source/dagflow/lib/linalg/covmatrix_from_cormatrix.py`).
pub fn covariance_from_correlation(c: &[f64], sigma: &[f64]) -> Vec<f64> {
    let n = sigma.len();
    let mut v = vec![0.0_f64; n * n];
    for i in 0..n {
        for j in 0..n {
            v[i * n + j] = sigma[i] * c[i * n + j] * sigma[j];
        }
    }
    v
}

/// `J . M . J^T` for `j` shaped `m x n` and `m` shaped `n x n`, the general (non-normalized)
/// covariance-propagation product (spec §4.8 `compute_covariance_matrix`).
#[must_use]
pub fn sandwich(j: &[f64], m_rows: usize, n_cols: usize, m: &[f64]) -> Vec<f64> {
    // jm = J . M, shape m_rows x n_cols
    let mut jm = vec![0.0_f64; m_rows * n_cols];
    for r in 0..m_rows {
        for c in 0..n_cols {
            let mut sum = 0.0;
            for k in 0..n_cols {
                sum += j[r * n_cols + k] * m[k * n_cols + c];
            }
            jm[r * n_cols + c] = sum;
        }
    }
    // out = jm . J^T, shape m_rows x m_rows
    let mut out = vec![0.0_f64; m_rows * m_rows];
    for r in 0..m_rows {
        for c in 0..m_rows {
            let mut sum = 0.0;
            for k in 0..n_cols {
                sum += jm[r * n_cols + k] * j[c * n_cols + k];
            }
            out[r * m_rows + c] = sum;
        }
    }
    out
}

/// `J . J^T` for `j` shaped `m x n` — the normalized-parameter special case of [`sandwich`]
/// where `M` is the identity (spec §4.8: "when parameters are already normalized").
#[must_use]
pub fn self_outer(j: &[f64], m_rows: usize, n_cols: usize) -> Vec<f64> {
    let mut out = vec![0.0_f64; m_rows * m_rows];
    for r in 0..m_rows {
        for c in 0..m_rows {
            let mut sum = 0.0;
            for k in 0..n_cols {
                sum += j[r * n_cols + k] * j[c * n_cols + k];
            }
            out[r * m_rows + c] = sum;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cholesky_recovers_the_source_matrix() {
        // V = [[4, 2], [2, 3]]
        let v = vec![4.0, 2.0, 2.0, 3.0];
        let l = cholesky_lower(&v, 2).unwrap();
        // L L^T should reproduce V.
        let mut recon = vec![0.0; 4];
        for i in 0..2 {
            for j in 0..2 {
                let mut sum = 0.0;
                for k in 0..2 {
                    sum += l[i * 2 + k] * l[j * 2 + k];
                }
                recon[i * 2 + j] = sum;
            }
        }
        for (a, b) in recon.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn non_positive_definite_matrix_is_rejected() {
        let v = vec![1.0, 2.0, 2.0, 1.0];
        assert!(cholesky_lower(&v, 2).is_err());
    }

    #[test]
    fn forward_then_backward_substitution_round_trips() {
        let l = cholesky_lower(&[4.0, 2.0, 2.0, 3.0], 2).unwrap();
        let x = vec![1.0, 2.0];
        let y = matvec_lower(&l, 2, &x);
        let z = solve_lower_triangular(&l, 2, &y);
        for (a, b) in z.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn self_outer_matches_sandwich_with_identity() {
        let j = vec![1.0, 2.0, 3.0, 4.0]; // 2x2
        let identity = vec![1.0, 0.0, 0.0, 1.0];
        let a = self_outer(&j, 2, 2);
        let b = sandwich(&j, 2, 2, &identity);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }
}
