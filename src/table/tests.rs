// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

/// Build a simple table: one squared group per output channel, one entry per
/// (channel, polarization).
fn simple_table(
    channel_freqs_hz: &[f64],
    pols: &[Polarization],
    weight: f64,
) -> ImagingTable {
    let mut entries = vec![];
    for (ch, &freq) in channel_freqs_hz.iter().enumerate() {
        for &pol in pols {
            entries.push(ImagingTableEntry {
                index: entries.len(),
                output_channel_index: ch,
                polarization: pol,
                squared_group_id: ch,
                image_count: 1,
                central_frequency_hz: freq,
                image_weight: weight,
            });
        }
    }
    ImagingTable::new(entries).unwrap()
}

#[test]
fn groups_are_derived_from_contiguous_ids() {
    let table = simple_table(
        &[100e6, 110e6, 120e6],
        &[Polarization::XX, Polarization::YY],
        1.0,
    );
    assert_eq!(table.entry_count(), 6);
    assert_eq!(table.squared_group_count(), 3);
    for (i, group) in table.squared_groups().enumerate() {
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].output_channel_index, i);
        assert_eq!(group[0].polarization, Polarization::XX);
        assert_eq!(group[1].polarization, Polarization::YY);
    }
}

#[test]
fn duplicate_entry_indices_are_rejected() {
    let mut entries = vec![];
    for i in 0..2 {
        entries.push(ImagingTableEntry {
            index: 0,
            output_channel_index: i,
            polarization: Polarization::StokesI,
            squared_group_id: i,
            image_count: 1,
            central_frequency_hz: 150e6,
            image_weight: 1.0,
        });
    }
    assert!(matches!(
        ImagingTable::new(entries),
        Err(TableError::DuplicateEntryIndex(0))
    ));
}

#[test]
fn non_contiguous_groups_are_rejected() {
    let entry = |index, group| ImagingTableEntry {
        index,
        output_channel_index: group,
        polarization: Polarization::StokesI,
        squared_group_id: group,
        image_count: 1,
        central_frequency_hz: 150e6,
        image_weight: 1.0,
    };
    let entries = vec![entry(0, 0), entry(1, 1), entry(2, 0)];
    assert!(matches!(
        ImagingTable::new(entries),
        Err(TableError::NonContiguousGroup(0))
    ));
}

#[test]
fn unordered_output_channels_are_rejected() {
    let entry = |index, group, out_channel| ImagingTableEntry {
        index,
        output_channel_index: out_channel,
        polarization: Polarization::StokesI,
        squared_group_id: group,
        image_count: 1,
        central_frequency_hz: 150e6,
        image_weight: 1.0,
    };
    let entries = vec![entry(0, 0, 1), entry(1, 1, 0)];
    assert!(matches!(
        ImagingTable::new(entries),
        Err(TableError::UnorderedGroups { first: 1, second: 0 })
    ));
}

#[test]
fn bad_image_count_is_rejected() {
    let entries = vec![ImagingTableEntry {
        index: 0,
        output_channel_index: 0,
        polarization: Polarization::StokesI,
        squared_group_id: 0,
        image_count: 3,
        central_frequency_hz: 150e6,
        image_weight: 1.0,
    }];
    assert!(matches!(
        ImagingTable::new(entries),
        Err(TableError::BadImageCount { index: 0, count: 3 })
    ));
}
