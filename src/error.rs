// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all wsdeconv-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsDeconvError {
    #[error("{0}")]
    Table(#[from] crate::table::TableError),

    #[error("{0}")]
    ImageSet(#[from] crate::image_set::ImageSetError),

    #[error("{0}")]
    Deconvolution(#[from] crate::deconvolution::DeconvolutionError),

    #[error("{0}")]
    Selection(#[from] crate::algorithm::SelectionError),

    #[error("{0}")]
    Kernel(#[from] crate::algorithm::KernelError),

    #[error("{0}")]
    Store(#[from] crate::io::StoreError),

    #[error("{0}")]
    Mask(#[from] crate::io::MaskError),
}
