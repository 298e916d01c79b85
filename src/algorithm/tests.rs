// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;
use crate::pol::Polarization::*;

const NO_FLAGS: SelectionFlags = SelectionFlags {
    use_external_tool: false,
    use_wavelets: false,
    multiscale: false,
    fast_multiscale: false,
};

#[test]
fn single_image_is_the_default() {
    let kind = select_algorithm(NO_FLAGS, &[StokesI], 1).unwrap();
    assert_eq!(kind, AlgorithmKind::SingleImage);

    let kind = select_algorithm(
        SelectionFlags {
            fast_multiscale: true,
            ..NO_FLAGS
        },
        &[StokesI],
        1,
    )
    .unwrap();
    assert_eq!(kind, AlgorithmKind::FastMultiscaleSingle);
}

#[test]
fn joint_shape_keys_the_variant() {
    let kind = select_algorithm(NO_FLAGS, &[StokesI], 8).unwrap();
    assert_eq!(
        kind,
        AlgorithmKind::JoinedFreq {
            fast_multiscale: false
        }
    );

    let kind = select_algorithm(NO_FLAGS, &[XX, YY], 1).unwrap();
    assert_eq!(
        kind,
        AlgorithmKind::JoinedPol {
            polarization_count: 2,
            fast_multiscale: false
        }
    );

    let kind = select_algorithm(
        SelectionFlags {
            fast_multiscale: true,
            ..NO_FLAGS
        },
        &[XX, XY, YX, YY],
        4,
    )
    .unwrap();
    assert_eq!(
        kind,
        AlgorithmKind::JoinedPolFreq {
            polarization_count: 4,
            fast_multiscale: true
        }
    );
}

#[test]
fn flags_override_in_priority_order() {
    let all = SelectionFlags {
        use_external_tool: true,
        use_wavelets: true,
        multiscale: true,
        fast_multiscale: true,
    };
    assert_eq!(
        select_algorithm(all, &[StokesI], 4).unwrap(),
        AlgorithmKind::ExternalTool
    );
    assert_eq!(
        select_algorithm(
            SelectionFlags {
                use_external_tool: false,
                ..all
            },
            &[StokesI],
            4
        )
        .unwrap(),
        AlgorithmKind::Wavelet
    );
    assert_eq!(
        select_algorithm(
            SelectionFlags {
                use_external_tool: false,
                use_wavelets: false,
                ..all
            },
            &[StokesI],
            4
        )
        .unwrap(),
        AlgorithmKind::Multiscale
    );
}

#[test]
fn zero_groups_is_fatal() {
    assert!(matches!(
        select_algorithm(NO_FLAGS, &[StokesI], 0),
        Err(SelectionError::NothingToClean)
    ));
}

#[test]
fn duplicate_polarizations_are_fatal() {
    assert!(matches!(
        select_algorithm(NO_FLAGS, &[XX, XX], 1),
        Err(SelectionError::DuplicatePolarization(XX))
    ));
}

#[test]
fn unsupported_polarization_counts_are_fatal() {
    assert!(matches!(
        select_algorithm(NO_FLAGS, &[XX, YY, StokesI], 1),
        Err(SelectionError::UnsupportedPolarizationCount(3))
    ));
}

#[test]
fn lone_cross_polarizations_are_rejected() {
    // {XX, XY} has XY but not YX.
    let result = select_algorithm(NO_FLAGS, &[XX, XY], 1);
    assert!(matches!(
        result,
        Err(SelectionError::MissingConjugateCross {
            present: XY,
            missing: YX,
        })
    ));

    // Both conjugate cross terms together are fine.
    let kind = select_algorithm(NO_FLAGS, &[XY, YX], 1).unwrap();
    assert_eq!(
        kind,
        AlgorithmKind::JoinedPol {
            polarization_count: 2,
            fast_multiscale: false
        }
    );

    // The full linear set is fine too.
    assert!(select_algorithm(NO_FLAGS, &[XX, XY, YX, YY], 2).is_ok());

    // Circular cross-hands behave the same way.
    assert!(matches!(
        select_algorithm(NO_FLAGS, &[RR, RL], 1),
        Err(SelectionError::MissingConjugateCross {
            present: RL,
            missing: LR,
        })
    ));
}
