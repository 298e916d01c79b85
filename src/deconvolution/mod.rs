// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The deconvolution orchestrator.
//!
//! The orchestrator owns the configuration, selects and owns exactly one
//! cleaning-algorithm instance sized to the (polarization x frequency) joint
//! shape, and drives one major iteration per [Deconvolution::perform] call:
//! load and average the residual/model images into the compacted working set,
//! run the kernel, store the residual back directly and the model back via
//! spectral interpolation.
//!
//! Lifecycle: unconfigured -> [Deconvolution::initialize_deconvolution_algorithm]
//! -> any number of [Deconvolution::perform] calls ->
//! [Deconvolution::free_deconvolution_algorithms] -> unconfigured. The entry
//! points are intended to be called sequentially from one controlling thread;
//! parallelism, if any, happens inside the kernel.


use std::collections::HashSet;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::algorithm::{
    select_algorithm, CleanKernel, KernelError, KernelFactory, KernelSettings, SelectionError,
    SelectionFlags,
};
use crate::binning::calculate_deconvolution_frequencies;
use crate::image_set::{BufferPool, ImageSet, ImageSetError};
use crate::io::{ImageStore, MaskError, MaskSource, StoreError};
use crate::pol::Polarization;
use crate::spectral::{SpectralFitter, SpectralFittingMode};
use crate::table::ImagingTable;

#[derive(Error, Debug)]
pub enum DeconvolutionError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("The clean mask is {width}x{height}, but the images being cleaned are {expected_width}x{expected_height}")]
    MaskDimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("Both an image mask and a region mask were configured; only one mask source may be used")]
    ConflictingMasks,

    #[error("perform was called before a deconvolution algorithm was initialized")]
    NotInitialized,

    #[error(transparent)]
    ImageSet(#[from] ImageSetError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// The fixed geometry of all images in one run.
#[derive(Debug, Clone, Copy)]
pub struct ImageGeometry {
    pub width: usize,
    pub height: usize,
    /// Pixel scales \[radians\].
    pub pixel_scale_x: f64,
    pub pixel_scale_y: f64,
    /// Synthesized beam size \[radians\].
    pub beam_size: f64,
}

/// Parsed deconvolution configuration. Defaults mirror a plain single-scale
/// clean with no iteration cap behaviour changes.
#[derive(Debug, Clone)]
pub struct DeconvolutionSettings {
    pub max_iterations: usize,
    pub threshold: f64,
    pub gain: f64,
    pub major_loop_gain: f64,
    pub allow_negative_components: bool,
    pub stop_on_negative_components: bool,

    pub multiscale: bool,
    pub fast_multiscale: bool,
    pub use_wavelets: bool,
    pub use_external_tool: bool,
    pub multiscale_threshold_bias: f64,
    pub multiscale_scale_bias: f64,
    pub clean_border_ratio: f64,

    /// How model images are smoothed across frequency when stored back. 0
    /// terms means no smoothing: the per-channel values are used directly.
    pub spectral_fitting_mode: SpectralFittingMode,
    pub spectral_fitting_terms: usize,

    /// 0 means one deconvolution channel per squared group (no frequency
    /// averaging during deconvolution).
    pub requested_deconvolution_channels: usize,

    pub thread_count: usize,

    /// Polarizations that join the integrated intensity estimates. Empty
    /// means all.
    pub linked_polarizations: HashSet<Polarization>,
    pub polarization_normalization_factor: f64,
}

impl Default for DeconvolutionSettings {
    fn default() -> DeconvolutionSettings {
        DeconvolutionSettings {
            max_iterations: 0,
            threshold: 0.0,
            gain: 0.1,
            major_loop_gain: 1.0,
            allow_negative_components: true,
            stop_on_negative_components: false,
            multiscale: false,
            fast_multiscale: false,
            use_wavelets: false,
            use_external_tool: false,
            multiscale_threshold_bias: 0.7,
            multiscale_scale_bias: 0.6,
            clean_border_ratio: 0.05,
            spectral_fitting_mode: SpectralFittingMode::NoFitting,
            spectral_fitting_terms: 0,
            requested_deconvolution_channels: 0,
            thread_count: 1,
            linked_polarizations: HashSet::new(),
            polarization_normalization_factor: 1.0,
        }
    }
}

/// Drives deconvolution major iterations. See the module docs for the
/// lifecycle.
pub struct Deconvolution {
    settings: DeconvolutionSettings,

    image_mask_source: Option<Box<dyn MaskSource>>,
    region_mask_source: Option<Box<dyn MaskSource>>,

    // State below is only present between initialize and free.
    kernel: Option<Box<dyn CleanKernel>>,
    geometry: Option<ImageGeometry>,
    psf_polarization: Option<Polarization>,
    clean_mask: Option<Arc<Vec<bool>>>,
    frequencies_hz: Vec<f64>,
    channel_weights: Vec<f64>,
    pool: BufferPool,
}

impl Deconvolution {
    pub fn new(settings: DeconvolutionSettings) -> Deconvolution {
        Deconvolution {
            settings,
            image_mask_source: None,
            region_mask_source: None,
            kernel: None,
            geometry: None,
            psf_polarization: None,
            clean_mask: None,
            frequencies_hz: vec![],
            channel_weights: vec![],
            pool: BufferPool::new(0),
        }
    }

    pub fn settings(&self) -> &DeconvolutionSettings {
        &self.settings
    }

    /// Use a fixed-format image mask (non-zero pixels are cleanable). Clears
    /// any cached mask.
    pub fn set_image_mask(&mut self, source: Box<dyn MaskSource>) {
        self.image_mask_source = Some(source);
        self.clean_mask = None;
    }

    /// Use a region mask. Clears any cached mask.
    pub fn set_region_mask(&mut self, source: Box<dyn MaskSource>) {
        self.region_mask_source = Some(source);
        self.clean_mask = None;
    }

    /// Validate the configuration against the imaging table, select the
    /// cleaning variant for its joint shape and build the kernel. On error no
    /// partial state is retained; the orchestrator can be re-configured.
    pub fn initialize_deconvolution_algorithm(
        &mut self,
        table: &ImagingTable,
        psf_polarization: Polarization,
        geometry: ImageGeometry,
        factory: &dyn KernelFactory,
    ) -> Result<(), DeconvolutionError> {
        self.kernel = None;

        let summed_count = table.squared_group_count();
        if summed_count == 0 {
            return Err(SelectionError::NothingToClean.into());
        }
        let joined_polarizations: Vec<Polarization> = table
            .squared_group(0)
            .iter()
            .map(|e| e.polarization)
            .collect();
        debug!(
            "Jointly cleaned polarizations: {}",
            joined_polarizations.iter().join(", ")
        );

        let flags = SelectionFlags {
            use_external_tool: self.settings.use_external_tool,
            use_wavelets: self.settings.use_wavelets,
            multiscale: self.settings.multiscale,
            fast_multiscale: self.settings.fast_multiscale,
        };
        let kind = select_algorithm(flags, &joined_polarizations, summed_count)?;
        debug!("Selected cleaning algorithm: {kind:?}");

        let (frequencies_hz, channel_weights) = calculate_deconvolution_frequencies(
            table,
            self.settings.requested_deconvolution_channels,
        );

        let clean_mask = self.load_mask(&geometry)?;

        let kernel_settings = KernelSettings {
            width: geometry.width,
            height: geometry.height,
            pixel_scale_x: geometry.pixel_scale_x,
            pixel_scale_y: geometry.pixel_scale_y,
            beam_size: geometry.beam_size,
            max_iterations: self.settings.max_iterations,
            threshold: self.settings.threshold,
            gain: self.settings.gain,
            major_loop_gain: self.settings.major_loop_gain,
            clean_border_ratio: self.settings.clean_border_ratio,
            allow_negative_components: self.settings.allow_negative_components,
            stop_on_negative_components: self.settings.stop_on_negative_components,
            multiscale_scale_bias: self.settings.multiscale_scale_bias,
            multiscale_threshold_bias: self.settings.multiscale_threshold_bias,
            thread_count: self.settings.thread_count,
            spectral_fitting_mode: self.settings.spectral_fitting_mode,
            spectral_fitting_terms: self.settings.spectral_fitting_terms,
            frequencies_hz: frequencies_hz.clone(),
            clean_mask,
        };
        self.kernel = Some(factory.create(kind, &kernel_settings)?);

        let image_size = geometry.width * geometry.height;
        if self.pool.image_size() != image_size {
            self.pool = BufferPool::new(image_size);
        }
        self.geometry = Some(geometry);
        self.psf_polarization = Some(psf_polarization);
        self.frequencies_hz = frequencies_hz;
        self.channel_weights = channel_weights;
        Ok(())
    }

    /// Run one major iteration: load and average residual/model/PSF images,
    /// execute the kernel, and store the updated residual (directly) and
    /// model (spectrally interpolated) back. Returns whether the kernel
    /// reached its major threshold, i.e. whether another major iteration is
    /// warranted.
    pub fn perform(
        &mut self,
        table: &ImagingTable,
        residual_store: &mut dyn ImageStore,
        model_store: &mut dyn ImageStore,
        psf_store: &mut dyn ImageStore,
        major_iteration_number: usize,
    ) -> Result<bool, DeconvolutionError> {
        let (geometry, psf_polarization) = match (self.geometry, self.psf_polarization) {
            (Some(g), Some(p)) if self.kernel.is_some() => (g, p),
            _ => return Err(DeconvolutionError::NotInitialized),
        };
        info!(" == Cleaning ({major_iteration_number}) ==");

        // 0 spectral terms means no smoothing: per-channel values are the
        // "terms". The term count is independent of the channel count.
        let mode = if self.settings.spectral_fitting_terms == 0 {
            SpectralFittingMode::NoFitting
        } else {
            self.settings.spectral_fitting_mode
        };
        let mut fitter = SpectralFitter::new(mode, self.settings.spectral_fitting_terms);
        fitter.set_frequencies(&self.frequencies_hz, &self.channel_weights);

        self.pool.trim();
        let requested = self.settings.requested_deconvolution_channels;
        let mut residual = ImageSet::new(
            table,
            requested,
            geometry.width,
            geometry.height,
            &mut self.pool,
        )?;
        let mut model = ImageSet::new(
            table,
            requested,
            geometry.width,
            geometry.height,
            &mut self.pool,
        )?;
        for set in [&mut residual, &mut model] {
            set.set_linked_polarizations(self.settings.linked_polarizations.clone());
            set.set_polarization_normalization_factor(
                self.settings.polarization_normalization_factor,
            );
        }

        residual.load_and_average(residual_store, &mut self.pool)?;
        model.load_and_average(model_store, &mut self.pool)?;
        let psfs = residual.load_and_average_psfs(psf_store, psf_polarization, &mut self.pool)?;

        let kernel = self
            .kernel
            .as_mut()
            .ok_or(DeconvolutionError::NotInitialized)?;
        let reached_major_threshold =
            kernel.execute_major_iteration(&mut residual, &mut model, &psfs)?;

        residual.assign_and_store(residual_store)?;
        model.interpolate_and_store(model_store, &fitter, &mut self.pool)?;

        for psf in psfs {
            self.pool.put(psf);
        }
        residual.recycle(&mut self.pool);
        model.recycle(&mut self.pool);
        Ok(reached_major_threshold)
    }

    /// Drop the bound kernel and cached mask, returning to the unconfigured
    /// state.
    pub fn free_deconvolution_algorithms(&mut self) {
        self.kernel = None;
        self.geometry = None;
        self.psf_polarization = None;
        self.clean_mask = None;
        self.frequencies_hz.clear();
        self.channel_weights.clear();
        self.pool.trim();
    }

    /// Lazily read the configured mask, reusing the cached copy when its
    /// dimensions still match.
    fn load_mask(
        &mut self,
        geometry: &ImageGeometry,
    ) -> Result<Option<Arc<Vec<bool>>>, DeconvolutionError> {
        if self.image_mask_source.is_some() && self.region_mask_source.is_some() {
            return Err(DeconvolutionError::ConflictingMasks);
        }
        let source = match (&mut self.image_mask_source, &mut self.region_mask_source) {
            (Some(source), _) => source,
            (None, Some(source)) => source,
            (None, None) => return Ok(None),
        };

        let image_size = geometry.width * geometry.height;
        if let Some(cached) = &self.clean_mask {
            if cached.len() == image_size {
                return Ok(Some(Arc::clone(cached)));
            }
            // Geometry changed since the mask was read.
            self.clean_mask = None;
        }

        if source.width() != geometry.width || source.height() != geometry.height {
            return Err(DeconvolutionError::MaskDimensionMismatch {
                expected_width: geometry.width,
                expected_height: geometry.height,
                width: source.width(),
                height: source.height(),
            });
        }
        info!("Reading clean mask...");
        let mut mask = vec![false; image_size];
        source.read(&mut mask)?;
        let mask = Arc::new(mask);
        self.clean_mask = Some(Arc::clone(&mask));
        Ok(Some(mask))
    }
}
