// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;
use crate::pol::Polarization;
use crate::table::{ImagingTable, ImagingTableEntry};

fn weighted_table(freqs_and_weights: &[(f64, f64)]) -> ImagingTable {
    let entries = freqs_and_weights
        .iter()
        .enumerate()
        .map(|(i, &(freq, weight))| ImagingTableEntry {
            index: i,
            output_channel_index: i,
            polarization: Polarization::StokesI,
            squared_group_id: i,
            image_count: 1,
            central_frequency_hz: freq,
            image_weight: weight,
        })
        .collect();
    ImagingTable::new(entries).unwrap()
}

#[test]
fn channel_of_is_monotonic_with_no_orphans() {
    for n_groups in 1..=12 {
        for n_channels in 1..=n_groups {
            let mapping: Vec<usize> = (0..n_groups)
                .map(|i| channel_of(i, n_channels, n_groups))
                .collect();
            assert!(mapping.windows(2).all(|w| w[0] <= w[1]));
            // Every channel is attained.
            for channel in 0..n_channels {
                assert!(
                    mapping.contains(&channel),
                    "channel {channel} orphaned for {n_groups} groups -> {n_channels} channels"
                );
            }
            assert_eq!(mapping[0], 0);
            assert_eq!(*mapping.last().unwrap(), n_channels - 1);
        }
    }
}

#[test]
fn first_group_of_channel_inverts_channel_of() {
    for n_groups in 1..=12 {
        for n_channels in 1..=n_groups {
            for channel in 0..n_channels {
                let group = first_group_of_channel(channel, n_channels, n_groups);
                assert_eq!(channel_of(group, n_channels, n_groups), channel);
            }
        }
    }
}

#[test]
fn zero_requested_channels_means_one_to_one() {
    assert_eq!(deconvolution_channel_count(0, 5), 5);
    assert_eq!(deconvolution_channel_count(3, 5), 3);
    // A request larger than the group count is clamped.
    assert_eq!(deconvolution_channel_count(8, 5), 5);
}

#[test]
fn four_groups_into_two_channels() {
    // 4 input groups at 100..130 MHz, equal weight, 2 deconvolution channels:
    // groups [0, 1] and [2, 3] average to 105 and 125 MHz.
    let table = weighted_table(&[(100e6, 1.0), (110e6, 1.0), (120e6, 1.0), (130e6, 1.0)]);
    let mapping: Vec<usize> = (0..4).map(|i| channel_of(i, 2, 4)).collect();
    assert_eq!(mapping, [0, 0, 1, 1]);

    let (frequencies, weights) = calculate_deconvolution_frequencies(&table, 2);
    assert_abs_diff_eq!(frequencies[0], 105e6);
    assert_abs_diff_eq!(frequencies[1], 125e6);
    assert_abs_diff_eq!(weights[0], 2.0);
    assert_abs_diff_eq!(weights[1], 2.0);
}

#[test]
fn unit_weights_give_unweighted_means() {
    let table = weighted_table(&[(100e6, 1.0), (104e6, 1.0), (130e6, 1.0), (150e6, 1.0)]);
    let (frequencies, _) = calculate_deconvolution_frequencies(&table, 2);
    assert_abs_diff_eq!(frequencies[0], 102e6);
    assert_abs_diff_eq!(frequencies[1], 140e6);
}

#[test]
fn weighted_mean_respects_weights() {
    let table = weighted_table(&[(100e6, 3.0), (200e6, 1.0)]);
    let (frequencies, weights) = calculate_deconvolution_frequencies(&table, 1);
    assert_abs_diff_eq!(frequencies[0], 125e6);
    assert_abs_diff_eq!(weights[0], 4.0);
}
