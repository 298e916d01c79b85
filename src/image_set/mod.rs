// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The image set: the compacted working set of image buffers the cleaning
//! algorithms operate on.
//!
//! An imaging run may produce more (output channel, polarization) images than
//! the cleaning algorithms want to work on jointly. The image set reconciles
//! the two: it owns one buffer per compacted (deconvolution channel,
//! polarization) slot, averages the imaging table's entries into those slots
//! on the way in, and expands them (by direct copy or spectral interpolation)
//! on the way out.
//!
//! The core subtlety is the slot cursor "rewind": when consecutive squared
//! groups map to the same deconvolution channel, their entries must land in
//! the *same* slots so that they are summed, not written disjointly. The
//! imaging table validates the contiguity this relies on.

mod pool;

pub use pool::BufferPool;

use std::collections::HashSet;

use indexmap::IndexMap;
use log::info;
use rayon::prelude::*;
use thiserror::Error;

use crate::binning::{
    calculate_deconvolution_frequencies, channel_of, deconvolution_channel_count,
    first_group_of_channel,
};
use crate::io::{ImageStore, StoreError};
use crate::pol::Polarization;
use crate::spectral::{SolveError, SpectralFitter};
use crate::table::ImagingTable;

#[derive(Error, Debug)]
pub enum ImageSetError {
    #[error("The imaging table has no squared groups; there is nothing to deconvolve")]
    EmptyTable,

    #[error("The spectral fitter has no frequencies; cannot interpolate to the output channels")]
    UnconfiguredFitter,

    #[error("Spectral interpolation of joined-polarization model images is not supported; use one deconvolution channel per squared group")]
    JoinedPolarizationInterpolation,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fit(#[from] SolveError),
}

/// One contiguous image buffer per compacted (deconvolution channel,
/// polarization, real/imaginary) slot, plus the index maps that tie the slots
/// back to imaging table entries.
pub struct ImageSet<'t> {
    table: &'t ImagingTable,
    width: usize,
    height: usize,
    image_size: usize,
    channels_in_deconvolution: usize,

    images: Vec<Vec<f64>>,

    /// entry.index -> first compacted slot of that entry. Many-to-one when
    /// multiple entries average into one deconvolution channel.
    table_index_to_image_index: IndexMap<usize, usize>,

    /// Compacted slot -> deconvolution channel, for PSF lookup.
    image_index_to_psf_index: Vec<usize>,

    /// Summed group weight per deconvolution channel.
    channel_weights: Vec<f64>,

    /// The polarizations that take part in joined intensity estimates. Empty
    /// means "all".
    linked_polarizations: HashSet<Polarization>,

    polarization_normalization_factor: f64,
}

impl<'t> ImageSet<'t> {
    /// Build the index maps and allocate the compacted buffers. A
    /// `requested_channels` of 0 means one deconvolution channel per squared
    /// group (no frequency averaging); requests above the group count are
    /// clamped so that no channel is left without input.
    pub fn new(
        table: &'t ImagingTable,
        requested_channels: usize,
        width: usize,
        height: usize,
        pool: &mut BufferPool,
    ) -> Result<ImageSet<'t>, ImageSetError> {
        let n_groups = table.squared_group_count();
        if n_groups == 0 {
            return Err(ImageSetError::EmptyTable);
        }
        let channels_in_deconvolution = deconvolution_channel_count(requested_channels, n_groups);

        let mut table_index_to_image_index = IndexMap::with_capacity(table.entry_count());
        let mut image_index_to_psf_index: Vec<usize> = vec![];
        let mut img_index = 0;
        let mut channel_start_index = 0;
        let mut last_channel = 0;
        let mut n_images = 0;
        for (sq_index, group) in table.squared_groups().enumerate() {
            let channel = channel_of(sq_index, channels_in_deconvolution, n_groups);
            if sq_index != 0 {
                if channel == last_channel {
                    // This group collapses into the previous group's channel:
                    // rewind the cursor so the entries sum into the same slots.
                    img_index = channel_start_index;
                } else {
                    channel_start_index = img_index;
                }
            }
            for entry in group {
                table_index_to_image_index.insert(entry.index, img_index);
                for _ in 0..entry.image_count {
                    if img_index == image_index_to_psf_index.len() {
                        image_index_to_psf_index.push(channel);
                    }
                    img_index += 1;
                }
            }
            n_images = n_images.max(img_index);
            last_channel = channel;
        }

        let (_, channel_weights) = calculate_deconvolution_frequencies(table, requested_channels);

        let images = (0..n_images).map(|_| pool.take()).collect();
        Ok(ImageSet {
            table,
            width,
            height,
            image_size: width * height,
            channels_in_deconvolution,
            images,
            table_index_to_image_index,
            image_index_to_psf_index,
            channel_weights,
            linked_polarizations: HashSet::new(),
            polarization_normalization_factor: 1.0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels_in_deconvolution(&self) -> usize {
        self.channels_in_deconvolution
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, image_index: usize) -> &[f64] {
        &self.images[image_index]
    }

    pub fn image_mut(&mut self, image_index: usize) -> &mut [f64] {
        &mut self.images[image_index]
    }

    /// The compacted slot of a table entry's (real) image.
    pub fn image_index(&self, table_entry_index: usize) -> Option<usize> {
        self.table_index_to_image_index.get(&table_entry_index).copied()
    }

    /// The deconvolution channel (and therefore PSF) of a compacted slot.
    pub fn psf_index(&self, image_index: usize) -> usize {
        self.image_index_to_psf_index[image_index]
    }

    pub fn table(&self) -> &ImagingTable {
        self.table
    }

    /// When non-empty, restricts which polarizations join the integrated
    /// intensity estimates.
    pub fn set_linked_polarizations(&mut self, linked: HashSet<Polarization>) {
        self.linked_polarizations = linked;
    }

    pub fn set_polarization_normalization_factor(&mut self, factor: f64) {
        self.polarization_normalization_factor = factor;
    }

    /// Move a buffer out of the set; the caller must [ImageSet::transfer] a
    /// buffer back before the slot is used again. This keeps large buffers
    /// single-owner across the kernel boundary instead of aliased.
    pub fn release(&mut self, image_index: usize) -> Vec<f64> {
        std::mem::take(&mut self.images[image_index])
    }

    /// Move a buffer back into a slot previously emptied by [ImageSet::release].
    pub fn transfer(&mut self, image_index: usize, buffer: Vec<f64>) {
        debug_assert_eq!(buffer.len(), self.image_size);
        self.images[image_index] = buffer;
    }

    /// Hand all buffers back to the pool, consuming the set.
    pub fn recycle(self, pool: &mut BufferPool) {
        for image in self.images {
            pool.put(image);
        }
    }

    /// Load every table entry's image(s) from `store`, summing entries that
    /// share a compacted slot and dividing each slot by its hit count.
    pub fn load_and_average(
        &mut self,
        store: &mut dyn ImageStore,
        pool: &mut BufferPool,
    ) -> Result<(), ImageSetError> {
        for image in &mut self.images {
            image.fill(0.0);
        }

        let mut scratch = pool.take();
        // TODO: use the real image weights here instead of hit counts.
        let mut counts = vec![0usize; self.images.len()];
        for entry in self.table.entries() {
            let slot = self.table_index_to_image_index[&entry.index];
            for i in 0..entry.image_count {
                store.load(
                    &mut scratch,
                    entry.polarization,
                    entry.output_channel_index,
                    i == 1,
                )?;
                add_to(&mut self.images[slot + i], &scratch);
                counts[slot + i] += 1;
            }
        }
        pool.put(scratch);

        for (image, &count) in self.images.iter_mut().zip(counts.iter()) {
            scale(image, 1.0 / count as f64);
        }
        Ok(())
    }

    /// Load one averaged PSF per deconvolution channel. PSFs are keyed by
    /// channel only; the polarization fan-out of the table is irrelevant.
    pub fn load_and_average_psfs(
        &self,
        store: &mut dyn ImageStore,
        psf_polarization: Polarization,
        pool: &mut BufferPool,
    ) -> Result<Vec<Vec<f64>>, ImageSetError> {
        let n_groups = self.table.squared_group_count();
        let mut psfs: Vec<Vec<f64>> = (0..self.channels_in_deconvolution)
            .map(|_| pool.take())
            .collect();
        let mut counts = vec![0usize; self.channels_in_deconvolution];

        let mut scratch = pool.take();
        for (sq_index, group) in self.table.squared_groups().enumerate() {
            let channel = channel_of(sq_index, self.channels_in_deconvolution, n_groups);
            let front = &group[0];
            store.load(
                &mut scratch,
                psf_polarization,
                front.output_channel_index,
                false,
            )?;
            add_to(&mut psfs[channel], &scratch);
            counts[channel] += 1;
        }
        pool.put(scratch);

        for (psf, &count) in psfs.iter_mut().zip(counts.iter()) {
            scale(psf, 1.0 / count as f64);
        }
        Ok(psfs)
    }

    /// Store every table entry's image(s) back. When channels were collapsed,
    /// each entry of a collapsed group receives an identical copy of its
    /// channel's buffer.
    pub fn assign_and_store(&self, store: &mut dyn ImageStore) -> Result<(), ImageSetError> {
        let n_groups = self.table.squared_group_count();
        if self.channels_in_deconvolution != n_groups {
            info!(
                "Assigning from {} to {} channels...",
                self.channels_in_deconvolution, n_groups
            );
        }
        for entry in self.table.entries() {
            let slot = self.table_index_to_image_index[&entry.index];
            for i in 0..entry.image_count {
                store.store(
                    &self.images[slot + i],
                    entry.polarization,
                    entry.output_channel_index,
                    i == 1,
                )?;
            }
        }
        Ok(())
    }

    /// Store model images back, spectrally interpolating from the
    /// deconvolution channels to each entry's exact central frequency. With no
    /// collapsed channels this is a direct store.
    ///
    /// Per pixel, a curve is fitted through the per-channel values and then
    /// evaluated per output entry. Pixels that are zero in every channel skip
    /// the fit entirely; most model pixels are zero, so this saves a lot of
    /// time. The per-pixel fits are independent, so they run in parallel.
    pub fn interpolate_and_store(
        &self,
        store: &mut dyn ImageStore,
        fitter: &SpectralFitter,
        pool: &mut BufferPool,
    ) -> Result<(), ImageSetError> {
        let n_groups = self.table.squared_group_count();
        if self.channels_in_deconvolution == n_groups {
            return self.assign_and_store(store);
        }

        info!(
            "Interpolating from {} to {} channels...",
            self.channels_in_deconvolution, n_groups
        );
        let n_terms = fitter.n_terms();
        if n_terms == 0 {
            return Err(ImageSetError::UnconfiguredFitter);
        }
        // The per-pixel spectrum below reads one slot per channel; joined
        // polarizations would need a separate fit per polarization.
        if self.images.len() != self.channels_in_deconvolution {
            return Err(ImageSetError::JoinedPolarizationInterpolation);
        }

        // First make a per-pixel "image" of fit terms, so that not all output
        // channel images have to be in memory at the same time.
        let mut terms_image = vec![0.0; self.image_size * n_terms];
        terms_image
            .par_chunks_mut(n_terms)
            .enumerate()
            .try_for_each_init(
                || {
                    (
                        vec![0.0; self.channels_in_deconvolution],
                        Vec::with_capacity(n_terms),
                    )
                },
                |(spectral_pixel, terms), (px, terms_row)| -> Result<(), SolveError> {
                    let mut is_zero = true;
                    for (s, image) in self.images.iter().enumerate() {
                        let value = image[px];
                        spectral_pixel[s] = value;
                        is_zero &= value == 0.0;
                    }
                    if !is_zero {
                        fitter.fit(terms, spectral_pixel)?;
                        terms_row.copy_from_slice(terms);
                    }
                    Ok(())
                },
            )?;

        // Now evaluate the fit at each output entry's frequency.
        let mut scratch = pool.take();
        for entry in self.table.entries() {
            let frequency = entry.central_frequency_hz;
            scratch
                .par_iter_mut()
                .zip(terms_image.par_chunks(n_terms))
                .for_each(|(out, terms)| {
                    *out = fitter.evaluate(terms, frequency);
                });
            store.store(
                &scratch,
                entry.polarization,
                entry.output_channel_index,
                false,
            )?;
        }
        pool.put(scratch);
        Ok(())
    }

    fn is_linked(&self, polarization: Polarization) -> bool {
        self.linked_polarizations.is_empty() || self.linked_polarizations.contains(&polarization)
    }

    /// A single intensity image: per channel, the Euclidean norm over the
    /// linked polarization slots, weighted by the channel's group weight and
    /// averaged across channels.
    pub fn get_square_integrated_with_normal_channels(&self, dest: &mut [f64], scratch: &mut [f64]) {
        let n_groups = self.table.squared_group_count();
        // With one channel, `scratch` isn't needed, which saves copying and
        // normalising the data.
        if self.channels_in_deconvolution == 1 {
            let group = self.table.squared_group(0);
            if group.len() == 1 {
                let slot = self.table_index_to_image_index[&group[0].index];
                dest.copy_from_slice(&self.images[slot]);
            } else {
                let mut is_first = true;
                for entry in group {
                    if !self.is_linked(entry.polarization) {
                        continue;
                    }
                    let slot = self.table_index_to_image_index[&entry.index];
                    if is_first {
                        assign_squared(dest, &self.images[slot]);
                        is_first = false;
                    } else {
                        add_squared_to(dest, &self.images[slot]);
                    }
                }
                if is_first {
                    dest.fill(0.0);
                } else {
                    let factor = self.polarization_normalization_factor.sqrt();
                    for d in dest.iter_mut() {
                        *d = d.sqrt() * factor;
                    }
                }
            }
        } else {
            let mut weight_sum = 0.0;
            for channel in 0..self.channels_in_deconvolution {
                let sq_index =
                    first_group_of_channel(channel, self.channels_in_deconvolution, n_groups);
                let group = self.table.squared_group(sq_index);
                let group_weight = self.channel_weights[channel];
                weight_sum += group_weight;
                if group.len() == 1 {
                    let slot = self.table_index_to_image_index[&group[0].index];
                    scratch.copy_from_slice(&self.images[slot]);
                } else {
                    let mut is_first = true;
                    for entry in group {
                        if !self.is_linked(entry.polarization) {
                            continue;
                        }
                        let slot = self.table_index_to_image_index[&entry.index];
                        if is_first {
                            assign_squared(scratch, &self.images[slot]);
                            is_first = false;
                        } else {
                            add_squared_to(scratch, &self.images[slot]);
                        }
                    }
                    if is_first {
                        scratch.fill(0.0);
                    } else {
                        for s in scratch.iter_mut() {
                            *s = s.sqrt();
                        }
                    }
                }

                if channel == 0 {
                    assign_scaled(dest, scratch, group_weight);
                } else {
                    add_scaled_to(dest, scratch, group_weight);
                }
            }
            // A zero weight sum is a legitimate degenerate input; the NaNs it
            // produces are defined behaviour rather than an error.
            scale(
                dest,
                self.polarization_normalization_factor.sqrt() / weight_sum,
            );
        }
    }

    /// Like [ImageSet::get_square_integrated_with_normal_channels], but the
    /// channels are summed as squares before a single final square root, and
    /// normalised by raw channel count instead of weight.
    pub fn get_square_integrated_with_squared_channels(&self, dest: &mut [f64]) {
        let n_groups = self.table.squared_group_count();
        let mut is_first = true;
        for channel in 0..self.channels_in_deconvolution {
            let sq_index =
                first_group_of_channel(channel, self.channels_in_deconvolution, n_groups);
            for entry in self.table.squared_group(sq_index) {
                if !self.is_linked(entry.polarization) {
                    continue;
                }
                let slot = self.table_index_to_image_index[&entry.index];
                if is_first {
                    assign_squared(dest, &self.images[slot]);
                    is_first = false;
                } else {
                    add_squared_to(dest, &self.images[slot]);
                }
            }
        }
        if is_first {
            dest.fill(0.0);
        } else {
            let factor = self.polarization_normalization_factor.sqrt()
                / self.channels_in_deconvolution as f64;
            for d in dest.iter_mut() {
                *d = d.sqrt() * factor;
            }
        }
    }

    /// A single intensity image formed by a weighted *linear* combination
    /// across channels and polarizations. A zero weight sum yields an all-zero
    /// output rather than a division fault.
    pub fn get_linear_integrated_with_normal_channels(&self, dest: &mut [f64]) {
        let n_groups = self.table.squared_group_count();
        if self.channels_in_deconvolution == 1 && self.table.squared_group(0).len() == 1 {
            let group = self.table.squared_group(0);
            let slot = self.table_index_to_image_index[&group[0].index];
            dest.copy_from_slice(&self.images[slot]);
        } else {
            let mut is_first = true;
            let mut weight_sum = 0.0;
            for channel in 0..self.channels_in_deconvolution {
                let sq_index =
                    first_group_of_channel(channel, self.channels_in_deconvolution, n_groups);
                let group_weight = self.channel_weights[channel];
                weight_sum += group_weight;
                for entry in self.table.squared_group(sq_index) {
                    if !self.is_linked(entry.polarization) {
                        continue;
                    }
                    let slot = self.table_index_to_image_index[&entry.index];
                    if is_first {
                        assign_scaled(dest, &self.images[slot], group_weight);
                        is_first = false;
                    } else {
                        add_scaled_to(dest, &self.images[slot], group_weight);
                    }
                }
            }
            if weight_sum > 0.0 && !is_first {
                scale(dest, self.polarization_normalization_factor / weight_sum);
            } else {
                dest.fill(0.0);
            }
        }
    }
}

fn add_to(dest: &mut [f64], src: &[f64]) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d += s;
    }
}

fn assign_squared(dest: &mut [f64], src: &[f64]) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d = s * s;
    }
}

fn add_squared_to(dest: &mut [f64], src: &[f64]) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d += s * s;
    }
}

fn assign_scaled(dest: &mut [f64], src: &[f64], factor: f64) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d = s * factor;
    }
}

fn add_scaled_to(dest: &mut [f64], src: &[f64], factor: f64) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d += s * factor;
    }
}

fn scale(dest: &mut [f64], factor: f64) {
    for d in dest.iter_mut() {
        *d *= factor;
    }
}
