// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics for spectral fitting.

#[cfg(test)]
mod tests;

use ndarray::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    #[error("The normal equations are singular; cannot fit {n_terms} terms to {n_samples} samples")]
    Singular { n_terms: usize, n_samples: usize },
}

/// Solve a weighted linear least-squares problem via its normal equations.
///
/// `basis` has one row per sample and one column per term; `values` and
/// `weights` have one element per sample. Returns the term vector minimising
/// the weighted squared residual. Spectral fits only ever have a handful of
/// terms, so Gaussian elimination on the normal equations is plenty.
pub(crate) fn solve_weighted_least_squares(
    basis: ArrayView2<f64>,
    values: &[f64],
    weights: &[f64],
) -> Result<Vec<f64>, SolveError> {
    let n_samples = basis.nrows();
    let n_terms = basis.ncols();
    debug_assert_eq!(values.len(), n_samples);
    debug_assert_eq!(weights.len(), n_samples);

    let mut normal = Array2::<f64>::zeros((n_terms, n_terms));
    let mut rhs = vec![0.0; n_terms];
    for s in 0..n_samples {
        let row = basis.row(s);
        let w = weights[s];
        for i in 0..n_terms {
            for j in 0..n_terms {
                normal[(i, j)] += w * row[i] * row[j];
            }
            rhs[i] += w * row[i] * values[s];
        }
    }

    solve_linear_system(normal, rhs).ok_or(SolveError::Singular { n_terms, n_samples })
}

/// Solve `a x = b` in place with partial pivoting. Returns `None` if `a` is
/// singular (to working precision).
fn solve_linear_system(mut a: Array2<f64>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        // Pivot on the largest remaining element in this column.
        let pivot_row =
            (col..n).max_by(|&i, &j| a[(i, col)].abs().total_cmp(&a[(j, col)].abs()))?;
        if a[(pivot_row, col)].abs() < f64::EPSILON {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                let tmp = a[(col, j)];
                a[(col, j)] = a[(pivot_row, j)];
                a[(pivot_row, j)] = tmp;
            }
            b.swap(col, pivot_row);
        }

        for row in col + 1..n {
            let factor = a[(row, col)] / a[(col, col)];
            for j in col..n {
                a[(row, j)] -= factor * a[(col, j)];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution.
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for col in row + 1..n {
            sum -= a[(row, col)] * x[col];
        }
        x[row] = sum / a[(row, row)];
    }
    Some(x)
}
