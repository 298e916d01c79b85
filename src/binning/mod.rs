// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Binning of squared groups into deconvolution channels.
//!
//! The deconvolution algorithms often work on fewer frequency channels than
//! the imaging run produces; the functions here define the (monotonic,
//! load-balanced) partition of input groups over those channels, and the
//! representative frequency of each channel.

#[cfg(test)]
mod tests;

use crate::table::ImagingTable;

/// The deconvolution channel that squared group `group_index` maps to.
///
/// Integer floor division makes this a monotonic partition that doesn't
/// require `n_groups` to be a multiple of `n_channels`.
#[inline]
pub fn channel_of(group_index: usize, n_channels: usize, n_groups: usize) -> usize {
    group_index * n_channels / n_groups
}

/// The first squared group that maps to deconvolution channel `channel`; the
/// inverse of [channel_of] used when one representative group per channel is
/// needed.
#[inline]
pub fn first_group_of_channel(channel: usize, n_channels: usize, n_groups: usize) -> usize {
    // The smallest i with i * n_channels / n_groups == channel. Flooring here
    // instead would pick a group of the previous channel whenever the
    // partition is uneven.
    (channel * n_groups).div_ceil(n_channels)
}

/// The number of deconvolution channels for a requested count. A request of 0
/// means "no averaging" (one channel per squared group), and a request can
/// never exceed the group count (an orphan channel would have nothing mapped
/// to it).
#[inline]
pub fn deconvolution_channel_count(requested: usize, n_groups: usize) -> usize {
    if requested == 0 {
        n_groups
    } else {
        requested.min(n_groups)
    }
}

/// For each deconvolution channel, the weight-averaged central frequency of
/// the squared groups mapping to it \[Hz\], along with each channel's summed
/// weight. Usable before any image buffers exist, for pre-flight frequency
/// planning.
///
/// A group's frequency and weight are taken from its first entry, as all its
/// polarizations share them.
pub fn calculate_deconvolution_frequencies(
    table: &ImagingTable,
    requested_channels: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n_groups = table.squared_group_count();
    let n_channels = deconvolution_channel_count(requested_channels, n_groups);
    let mut frequencies = vec![0.0; n_channels];
    let mut weights = vec![0.0; n_channels];
    for (i, group) in table.squared_groups().enumerate() {
        let entry = &group[0];
        let channel = channel_of(i, n_channels, n_groups);
        frequencies[channel] += entry.central_frequency_hz * entry.image_weight;
        weights[channel] += entry.image_weight;
    }
    for (freq, weight) in frequencies.iter_mut().zip(weights.iter()) {
        *freq /= weight;
    }
    (frequencies, weights)
}
