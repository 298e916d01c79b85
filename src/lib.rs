// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Joined-channel and joined-polarization deconvolution bookkeeping for
radio-interferometric imaging.

An imaging run hands this crate a table of dirty, model and PSF images, one
per (output channel, polarization); the crate averages them into a smaller
working set of "deconvolution channels", selects the cleaning-algorithm
variant matching the joint shape, drives one major iteration at a time, and
redistributes the results back over the output channels, interpolating model
images across frequency where channels were averaged together.

The numeric cleaning kernels, the image storage and the mask files live
outside this crate, behind the traits in [algorithm] and [io].
 */

pub mod algorithm;
pub mod binning;
pub mod deconvolution;
mod error;
pub mod image_set;
pub mod io;
pub(crate) mod math;
pub mod pol;
pub mod spectral;
pub mod table;

// Re-exports.
pub use algorithm::{AlgorithmKind, CleanKernel, KernelFactory, KernelSettings};
pub use deconvolution::{Deconvolution, DeconvolutionSettings, ImageGeometry};
pub use error::WsDeconvError;
pub use image_set::{BufferPool, ImageSet};
pub use pol::Polarization;
pub use spectral::{SpectralFitter, SpectralFittingMode};
pub use table::{ImagingTable, ImagingTableEntry};
