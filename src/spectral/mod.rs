// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spectral fitting of per-channel pixel values.
//!
//! When model images are interpolated from the deconvolution channels back to
//! a larger number of output channels, a smooth function is fitted through
//! each pixel's per-channel values and evaluated at each output channel's
//! exact frequency. The fitter is deliberately small: a compact term vector
//! per pixel, and a deterministic fit/evaluate pair.


use ndarray::prelude::*;
use strum_macros::{Display, EnumString};

use crate::math::solve_weighted_least_squares;
pub use crate::math::SolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SpectralFittingMode {
    /// No smoothing: the per-channel values are the "terms".
    #[strum(serialize = "no-fitting")]
    NoFitting,

    /// Ordinary polynomial in (nu / nu_ref - 1).
    #[strum(serialize = "polynomial")]
    Polynomial,

    /// Polynomial in log(nu / nu_ref) of the log brightness, i.e. a curved
    /// power law.
    #[strum(serialize = "log-polynomial")]
    LogPolynomial,
}

/// Fits a compact spectral term vector through one pixel's per-channel values,
/// and evaluates the fitted curve at arbitrary frequencies.
#[derive(Debug, Clone)]
pub struct SpectralFitter {
    mode: SpectralFittingMode,
    n_terms: usize,
    frequencies_hz: Vec<f64>,
    weights: Vec<f64>,
    reference_frequency_hz: f64,
}

impl SpectralFitter {
    pub fn new(mode: SpectralFittingMode, n_terms: usize) -> SpectralFitter {
        SpectralFitter {
            mode,
            n_terms,
            frequencies_hz: vec![],
            weights: vec![],
            reference_frequency_hz: 1.0,
        }
    }

    /// Set the deconvolution channels' representative frequencies and summed
    /// weights. The reference frequency is their weighted mean.
    pub fn set_frequencies(&mut self, frequencies_hz: &[f64], weights: &[f64]) {
        debug_assert_eq!(frequencies_hz.len(), weights.len());
        let weight_sum: f64 = weights.iter().sum();
        self.reference_frequency_hz = if weight_sum > 0.0 {
            frequencies_hz
                .iter()
                .zip(weights.iter())
                .map(|(f, w)| f * w)
                .sum::<f64>()
                / weight_sum
        } else {
            1.0
        };
        self.frequencies_hz = frequencies_hz.to_vec();
        self.weights = weights.to_vec();
    }

    /// The length of the term vector [fit] produces.
    pub fn n_terms(&self) -> usize {
        match self.mode {
            SpectralFittingMode::NoFitting => self.frequencies_hz.len(),
            // Never fit more terms than there are channels to constrain them.
            _ => self.n_terms.clamp(1, self.frequencies_hz.len().max(1)),
        }
    }

    /// Fit `values` (one per deconvolution channel) into `terms`. `terms` is
    /// cleared and refilled; its final length is [SpectralFitter::n_terms].
    pub fn fit(&self, terms: &mut Vec<f64>, values: &[f64]) -> Result<(), SolveError> {
        debug_assert_eq!(values.len(), self.frequencies_hz.len());
        terms.clear();
        let n_terms = self.n_terms();
        match self.mode {
            SpectralFittingMode::NoFitting => terms.extend_from_slice(values),
            SpectralFittingMode::Polynomial => {
                let basis = self.polynomial_basis(|f| f / self.reference_frequency_hz - 1.0);
                terms.extend(solve_weighted_least_squares(
                    basis.view(),
                    values,
                    &self.weights,
                )?);
            }
            SpectralFittingMode::LogPolynomial => {
                // The log spectrum is only defined for one sign of brightness;
                // fit the magnitudes against the sign of the weighted sum, and
                // floor outliers of the opposite sign.
                let sign = values
                    .iter()
                    .zip(self.weights.iter())
                    .map(|(v, w)| v * w)
                    .sum::<f64>()
                    .signum();
                let max_abs = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
                if max_abs == 0.0 {
                    terms.resize(n_terms, 0.0);
                    return Ok(());
                }
                let floor = 1e-8 * max_abs;
                let logs: Vec<f64> = values
                    .iter()
                    .map(|v| (sign * v).max(floor).ln())
                    .collect();
                let basis = self.polynomial_basis(|f| (f / self.reference_frequency_hz).ln());
                let fitted = solve_weighted_least_squares(basis.view(), &logs, &self.weights)?;
                terms.push(sign * fitted[0].exp());
                terms.extend_from_slice(&fitted[1..]);
            }
        }
        Ok(())
    }

    /// Evaluate a fitted term vector at `frequency_hz`.
    pub fn evaluate(&self, terms: &[f64], frequency_hz: f64) -> f64 {
        match self.mode {
            SpectralFittingMode::NoFitting => {
                // The term of the nearest deconvolution channel.
                self.frequencies_hz
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        (*a - frequency_hz)
                            .abs()
                            .total_cmp(&(*b - frequency_hz).abs())
                    })
                    .map(|(i, _)| terms[i])
                    .unwrap_or(0.0)
            }
            SpectralFittingMode::Polynomial => {
                let x = frequency_hz / self.reference_frequency_hz - 1.0;
                horner(terms, x)
            }
            SpectralFittingMode::LogPolynomial => {
                if terms.is_empty() || terms[0] == 0.0 {
                    return 0.0;
                }
                let x = (frequency_hz / self.reference_frequency_hz).ln();
                let mut exponent_sum = 0.0;
                let mut x_power = 1.0;
                for &term in &terms[1..] {
                    x_power *= x;
                    exponent_sum += term * x_power;
                }
                terms[0] * exponent_sum.exp()
            }
        }
    }

    /// One row per channel, columns 1, x, x^2, ... with `x = transform(freq)`.
    fn polynomial_basis<F: Fn(f64) -> f64>(&self, transform: F) -> Array2<f64> {
        let n_terms = self.n_terms();
        let mut basis = Array2::zeros((self.frequencies_hz.len(), n_terms));
        for (s, &freq) in self.frequencies_hz.iter().enumerate() {
            let x = transform(freq);
            let mut x_power = 1.0;
            for t in 0..n_terms {
                basis[(s, t)] = x_power;
                x_power *= x;
            }
        }
        basis
    }
}

fn horner(terms: &[f64], x: f64) -> f64 {
    terms.iter().rev().fold(0.0, |acc, &term| acc * x + term)
}
