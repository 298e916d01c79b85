// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::*;

#[test]
fn exact_line_fit() {
    // y = 2 + 3x, sampled exactly.
    let xs = [0.0, 1.0, 2.0, 3.0];
    let mut basis = Array2::zeros((4, 2));
    for (i, &x) in xs.iter().enumerate() {
        basis[(i, 0)] = 1.0;
        basis[(i, 1)] = x;
    }
    let values: Vec<f64> = xs.iter().map(|&x| 2.0 + 3.0 * x).collect();
    let weights = [1.0; 4];
    let terms = solve_weighted_least_squares(basis.view(), &values, &weights).unwrap();
    assert_abs_diff_eq!(terms[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(terms[1], 3.0, epsilon = 1e-12);
}

#[test]
fn weights_pull_the_fit() {
    // Two samples at the same x with different values: the weighted mean wins.
    let basis = array![[1.0], [1.0]];
    let terms = solve_weighted_least_squares(basis.view(), &[1.0, 4.0], &[3.0, 1.0]).unwrap();
    assert_abs_diff_eq!(terms[0], 1.75, epsilon = 1e-12);
}

#[test]
fn singular_system_is_reported() {
    // Two identical basis columns are degenerate.
    let basis = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
    let result = solve_weighted_least_squares(basis.view(), &[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]);
    assert_eq!(
        result,
        Err(SolveError::Singular {
            n_terms: 2,
            n_samples: 3
        })
    );
}

#[test]
fn pivoting_handles_zero_leading_element() {
    let a = array![[0.0, 1.0], [1.0, 0.0]];
    let x = solve_linear_system(a, vec![2.0, 3.0]).unwrap();
    assert_abs_diff_eq!(x[0], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
}
