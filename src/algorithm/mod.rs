// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cleaning-algorithm selection.
//!
//! Many cleaning variants exist, keyed by how many polarizations and frequency
//! channels are cleaned jointly and whether an accelerated multiscale kernel
//! is wanted. The numeric kernels themselves live outside this crate, behind
//! [CleanKernel] and [KernelFactory]; this module owns only the taxonomy
//! ([AlgorithmKind]), the scalar configuration handed to a kernel
//! ([KernelSettings]) and the explicit selection policy.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::image_set::ImageSet;
use crate::pol::Polarization;
use crate::spectral::SpectralFittingMode;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Nothing to clean: the imaging table has no squared groups")]
    NothingToClean,

    #[error("Two equal polarizations ({0}) were given to the deconvolution algorithm within a single squared group")]
    DuplicatePolarization(Polarization),

    #[error("Joined polarization cleaning was requested, but can't find a compatible set of 2 or 4 polarizations to clean (got {0})")]
    UnsupportedPolarizationCount(usize),

    #[error("Cannot jointly clean polarization {present} without also cleaning {missing}")]
    MissingConjugateCross {
        present: Polarization,
        missing: Polarization,
    },
}

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("The cleaning kernel failed: {0}")]
    Failed(String),
}

/// The shape of cleaning to perform, in selection-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// An external deconvolution program drives the cleaning.
    ExternalTool,

    /// Wavelet-based (IUWT) deconvolution.
    Wavelet,

    /// Multiscale cleaning over the whole set.
    Multiscale,

    /// Joint cleaning over both multiple channels and multiple polarizations.
    JoinedPolFreq {
        polarization_count: usize,
        fast_multiscale: bool,
    },

    /// Joint cleaning over multiple channels, one polarization.
    JoinedFreq { fast_multiscale: bool },

    /// Joint cleaning over multiple polarizations, one channel.
    JoinedPol {
        polarization_count: usize,
        fast_multiscale: bool,
    },

    /// Plain single-image cleaning with the accelerated multiscale kernel.
    FastMultiscaleSingle,

    /// Plain single-image cleaning.
    SingleImage,
}

/// Scalar configuration handed to a kernel at construction.
#[derive(Debug, Clone)]
pub struct KernelSettings {
    pub width: usize,
    pub height: usize,
    pub pixel_scale_x: f64,
    pub pixel_scale_y: f64,
    pub beam_size: f64,

    pub max_iterations: usize,
    pub threshold: f64,
    pub gain: f64,
    pub major_loop_gain: f64,
    pub clean_border_ratio: f64,
    pub allow_negative_components: bool,
    pub stop_on_negative_components: bool,
    pub multiscale_scale_bias: f64,
    pub multiscale_threshold_bias: f64,
    pub thread_count: usize,

    pub spectral_fitting_mode: SpectralFittingMode,
    pub spectral_fitting_terms: usize,

    /// Representative frequency per deconvolution channel \[Hz\].
    pub frequencies_hz: Vec<f64>,

    /// Shared read-only clean mask (width x height), if configured.
    pub clean_mask: Option<Arc<Vec<bool>>>,
}

/// One cleaning-algorithm instance. A kernel performs exactly one *major*
/// iteration per call: it decides internally how many minor iterations and
/// threshold crossings occur, mutates the residual and model sets, and
/// reports whether a further major iteration is warranted.
///
/// Image buffers may be moved out of the sets (via [ImageSet::release]) for
/// the duration of the call, but must be transferred back before returning;
/// the sets are stored to the backing store right after.
pub trait CleanKernel {
    fn execute_major_iteration(
        &mut self,
        residual: &mut ImageSet,
        model: &mut ImageSet,
        psfs: &[Vec<f64>],
    ) -> Result<bool, KernelError>;
}

/// Builds concrete kernels; implemented by the numeric-kernel collaborator.
pub trait KernelFactory {
    fn create(
        &self,
        kind: AlgorithmKind,
        settings: &KernelSettings,
    ) -> Result<Box<dyn CleanKernel>, KernelError>;
}

/// Flags influencing which [AlgorithmKind] is selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionFlags {
    pub use_external_tool: bool,
    pub use_wavelets: bool,
    pub multiscale: bool,
    pub fast_multiscale: bool,
}

/// Pick the cleaning variant for a given joint shape. First match wins:
/// external tool, wavelets and multiscale override the joint shape; otherwise
/// the shape is keyed on (channel joint count, polarization joint count).
///
/// `polarizations` are the jointly-cleaned polarizations (one squared group's
/// entries, in table order); `group_count` is the number of squared groups.
pub fn select_algorithm(
    flags: SelectionFlags,
    polarizations: &[Polarization],
    group_count: usize,
) -> Result<AlgorithmKind, SelectionError> {
    if group_count == 0 {
        return Err(SelectionError::NothingToClean);
    }

    let polarization_count = polarizations.len();
    let mut unique: HashSet<Polarization> = HashSet::with_capacity(polarization_count);
    for &pol in polarizations {
        if !unique.insert(pol) {
            return Err(SelectionError::DuplicatePolarization(pol));
        }
    }
    let polarizations = unique;

    if flags.use_external_tool {
        return Ok(AlgorithmKind::ExternalTool);
    }
    if flags.use_wavelets {
        return Ok(AlgorithmKind::Wavelet);
    }
    if flags.multiscale {
        return Ok(AlgorithmKind::Multiscale);
    }

    if polarization_count != 1 {
        if polarization_count != 2 && polarization_count != 4 {
            return Err(SelectionError::UnsupportedPolarizationCount(
                polarization_count,
            ));
        }
        // Cross-hand polarizations only make sense in conjugate pairs.
        for &pol in &polarizations {
            if let Some(conjugate) = pol.conjugate_cross() {
                if !polarizations.contains(&conjugate) {
                    return Err(SelectionError::MissingConjugateCross {
                        present: pol,
                        missing: conjugate,
                    });
                }
            }
        }

        if group_count != 1 {
            Ok(AlgorithmKind::JoinedPolFreq {
                polarization_count,
                fast_multiscale: flags.fast_multiscale,
            })
        } else {
            Ok(AlgorithmKind::JoinedPol {
                polarization_count,
                fast_multiscale: flags.fast_multiscale,
            })
        }
    } else if group_count != 1 {
        Ok(AlgorithmKind::JoinedFreq {
            fast_multiscale: flags.fast_multiscale,
        })
    } else if flags.fast_multiscale {
        Ok(AlgorithmKind::FastMultiscaleSingle)
    } else {
        Ok(AlgorithmKind::SingleImage)
    }
}
