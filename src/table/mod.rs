// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The imaging table: the external description of every image that takes part
//! in a deconvolution run.
//!
//! Each entry names one (output channel, polarization) image pair. Entries
//! that must be combined quadratically to form an intensity estimate (e.g.
//! paired cross-hand polarizations) share a "squared group". The table is
//! an ordered, read-only input; the rest of the crate only ever derives
//! compacted indices from it.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::ops::Range;

use thiserror::Error;

use crate::pol::Polarization;

/// One row of the imaging table, describing a single image (or a real/imaginary
/// image pair when `image_count` is 2).
#[derive(Debug, Clone)]
pub struct ImagingTableEntry {
    /// Identity key; unique over the whole table.
    pub index: usize,

    /// The output frequency channel this entry's images belong to.
    pub output_channel_index: usize,

    pub polarization: Polarization,

    /// Entries sharing this id form one squared group.
    pub squared_group_id: usize,

    /// 1 for a real-only image, 2 for a real+imaginary pair.
    pub image_count: usize,

    /// The central frequency of this entry's images \[Hz\].
    pub central_frequency_hz: f64,

    /// The relative weight of this entry when frequency channels are averaged
    /// together.
    pub image_weight: f64,
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Imaging table entry index {0} occurs more than once")]
    DuplicateEntryIndex(usize),

    #[error("Imaging table entry {index} has image count {count}; only 1 or 2 are allowed")]
    BadImageCount { index: usize, count: usize },

    #[error("Squared group {0} is not contiguous in the imaging table")]
    NonContiguousGroup(usize),

    #[error(
        "Squared groups are not ordered by output channel (channel {first} appears before \
         {second}); averaging would silently miscompute"
    )]
    UnorderedGroups { first: usize, second: usize },
}

/// An ordered sequence of [ImagingTableEntry]s, with views onto its squared
/// groups. Immutable once built.
#[derive(Debug, Clone)]
pub struct ImagingTable {
    entries: Vec<ImagingTableEntry>,

    /// Ranges into `entries`, one per squared group, in table order.
    groups: Vec<Range<usize>>,
}

impl ImagingTable {
    /// Build a table from entries, validating the structural assumptions the
    /// averaging logic relies on: unique entry indices, sane image counts,
    /// contiguous squared groups, and groups ordered by output channel.
    pub fn new(entries: Vec<ImagingTableEntry>) -> Result<ImagingTable, TableError> {
        let mut seen_indices = HashSet::with_capacity(entries.len());
        let mut seen_groups = HashSet::new();
        let mut groups: Vec<Range<usize>> = vec![];
        let mut last_group_id = None;
        for (i, entry) in entries.iter().enumerate() {
            if !seen_indices.insert(entry.index) {
                return Err(TableError::DuplicateEntryIndex(entry.index));
            }
            if entry.image_count == 0 || entry.image_count > 2 {
                return Err(TableError::BadImageCount {
                    index: entry.index,
                    count: entry.image_count,
                });
            }
            if last_group_id == Some(entry.squared_group_id) {
                groups.last_mut().unwrap().end = i + 1;
            } else {
                if !seen_groups.insert(entry.squared_group_id) {
                    return Err(TableError::NonContiguousGroup(entry.squared_group_id));
                }
                groups.push(i..i + 1);
                last_group_id = Some(entry.squared_group_id);
            }
        }

        // The compacted-index logic assumes squared groups that collapse into
        // one deconvolution channel are adjacent, which holds iff the groups
        // are sorted by output channel.
        let table = ImagingTable { entries, groups };
        for w in table.groups.windows(2) {
            let first = table.entries[w[0].start].output_channel_index;
            let second = table.entries[w[1].start].output_channel_index;
            if first > second {
                return Err(TableError::UnorderedGroups { first, second });
            }
        }
        Ok(table)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ImagingTableEntry> {
        self.entries.iter()
    }

    pub fn squared_group_count(&self) -> usize {
        self.groups.len()
    }

    /// The entries of the `i`th squared group, in table order.
    ///
    /// # Panics
    ///
    /// Panics if `i >= squared_group_count()`.
    pub fn squared_group(&self, i: usize) -> &[ImagingTableEntry] {
        &self.entries[self.groups[i].clone()]
    }

    /// Iterate over the squared groups in table order.
    pub fn squared_groups(&self) -> impl Iterator<Item = &[ImagingTableEntry]> {
        self.groups.iter().map(move |r| &self.entries[r.clone()])
    }
}
