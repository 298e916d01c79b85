// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Collaborator traits for image and mask storage.
//!
//! Deconvolution itself never touches files; it round-trips width x height
//! real arrays through an [ImageStore] (usually disk-backed in a real imager)
//! and reads clean masks through a [MaskSource] (usually a FITS or region
//! file). An in-memory store is provided for tests and small pipelines.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use thiserror::Error;

use crate::pol::Polarization;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No image stored for polarization {polarization}, output channel {output_channel_index} (imaginary: {is_imaginary})")]
    MissingImage {
        polarization: Polarization,
        output_channel_index: usize,
        is_imaginary: bool,
    },

    #[error("Image store buffer size mismatch: expected {expected} pixels, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("IO error when accessing the image store: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("IO error when reading the mask: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-for-byte storage of one width x height real image per
/// (polarization, output channel, real/imaginary) key.
pub trait ImageStore {
    /// Fill `buffer` with a previously stored image.
    fn load(
        &mut self,
        buffer: &mut [f64],
        polarization: Polarization,
        output_channel_index: usize,
        is_imaginary: bool,
    ) -> Result<(), StoreError>;

    /// Store `buffer` under the given key, replacing any previous image.
    fn store(
        &mut self,
        buffer: &[f64],
        polarization: Polarization,
        output_channel_index: usize,
        is_imaginary: bool,
    ) -> Result<(), StoreError>;
}

/// A source of a boolean clean mask with fixed dimensions.
pub trait MaskSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Fill `buffer` (width x height, row-major) with the mask.
    fn read(&mut self, buffer: &mut [bool]) -> Result<(), MaskError>;
}

/// An [ImageStore] keeping everything in memory.
pub struct MemoryImageStore {
    image_size: usize,
    images: HashMap<(Polarization, usize, bool), Vec<f64>>,
}

impl MemoryImageStore {
    pub fn new(width: usize, height: usize) -> MemoryImageStore {
        MemoryImageStore {
            image_size: width * height,
            images: HashMap::new(),
        }
    }

    /// Direct access to a stored image, mostly useful to set up inputs.
    pub fn get(
        &self,
        polarization: Polarization,
        output_channel_index: usize,
        is_imaginary: bool,
    ) -> Option<&[f64]> {
        self.images
            .get(&(polarization, output_channel_index, is_imaginary))
            .map(|v| v.as_slice())
    }
}

impl ImageStore for MemoryImageStore {
    fn load(
        &mut self,
        buffer: &mut [f64],
        polarization: Polarization,
        output_channel_index: usize,
        is_imaginary: bool,
    ) -> Result<(), StoreError> {
        if buffer.len() != self.image_size {
            return Err(StoreError::SizeMismatch {
                expected: self.image_size,
                got: buffer.len(),
            });
        }
        let image = self
            .images
            .get(&(polarization, output_channel_index, is_imaginary))
            .ok_or(StoreError::MissingImage {
                polarization,
                output_channel_index,
                is_imaginary,
            })?;
        buffer.copy_from_slice(image);
        Ok(())
    }

    fn store(
        &mut self,
        buffer: &[f64],
        polarization: Polarization,
        output_channel_index: usize,
        is_imaginary: bool,
    ) -> Result<(), StoreError> {
        if buffer.len() != self.image_size {
            return Err(StoreError::SizeMismatch {
                expected: self.image_size,
                got: buffer.len(),
            });
        }
        self.images
            .insert((polarization, output_channel_index, is_imaginary), buffer.to_vec());
        Ok(())
    }
}

/// A [MaskSource] backed by a boolean array, for tests and callers that build
/// masks themselves.
pub struct ArrayMaskSource {
    width: usize,
    height: usize,
    mask: Vec<bool>,
}

impl ArrayMaskSource {
    pub fn new(width: usize, height: usize, mask: Vec<bool>) -> ArrayMaskSource {
        assert_eq!(mask.len(), width * height);
        ArrayMaskSource { width, height, mask }
    }
}

impl MaskSource for ArrayMaskSource {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read(&mut self, buffer: &mut [bool]) -> Result<(), MaskError> {
        buffer.copy_from_slice(&self.mask);
        Ok(())
    }
}
