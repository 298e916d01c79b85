// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

#[test]
fn memory_store_round_trips_exactly() {
    let mut store = MemoryImageStore::new(2, 2);
    let image = [1.0, -2.5, 0.0, 4.0e-13];
    store.store(&image, Polarization::XX, 3, false).unwrap();

    let mut buffer = [0.0; 4];
    store.load(&mut buffer, Polarization::XX, 3, false).unwrap();
    assert_eq!(buffer, image);
}

#[test]
fn missing_image_is_an_error() {
    let mut store = MemoryImageStore::new(2, 2);
    let mut buffer = [0.0; 4];
    let result = store.load(&mut buffer, Polarization::YY, 0, true);
    assert!(matches!(
        result,
        Err(StoreError::MissingImage {
            polarization: Polarization::YY,
            output_channel_index: 0,
            is_imaginary: true,
        })
    ));
}

#[test]
fn size_mismatch_is_an_error() {
    let mut store = MemoryImageStore::new(2, 2);
    let result = store.store(&[0.0; 3], Polarization::XX, 0, false);
    assert!(matches!(
        result,
        Err(StoreError::SizeMismatch { expected: 4, got: 3 })
    ));
}

#[test]
fn array_mask_source_reads_back() {
    let mask = vec![true, false, false, true];
    let mut source = ArrayMaskSource::new(2, 2, mask.clone());
    assert_eq!(source.width(), 2);
    assert_eq!(source.height(), 2);
    let mut buffer = vec![false; 4];
    source.read(&mut buffer).unwrap();
    assert_eq!(buffer, mask);
}
