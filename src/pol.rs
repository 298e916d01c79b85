// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Polarizations of the images being deconvolved.

use strum_macros::{Display, EnumString};

/// A single polarization of an image. Instrumental (linear or circular) and
/// Stokes polarizations are both represented, because an imaging run may
/// deconvolve either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Polarization {
    #[strum(serialize = "XX")]
    XX,
    #[strum(serialize = "XY")]
    XY,
    #[strum(serialize = "YX")]
    YX,
    #[strum(serialize = "YY")]
    YY,
    #[strum(serialize = "RR")]
    RR,
    #[strum(serialize = "RL")]
    RL,
    #[strum(serialize = "LR")]
    LR,
    #[strum(serialize = "LL")]
    LL,
    #[strum(serialize = "I")]
    StokesI,
    #[strum(serialize = "Q")]
    StokesQ,
    #[strum(serialize = "U")]
    StokesU,
    #[strum(serialize = "V")]
    StokesV,
}

impl Polarization {
    /// Is this a cross-hand polarization? Cross-hands come in conjugate pairs
    /// and cannot be jointly cleaned without their partner.
    pub fn is_cross(self) -> bool {
        matches!(
            self,
            Polarization::XY | Polarization::YX | Polarization::RL | Polarization::LR
        )
    }

    /// The conjugate partner of a cross-hand polarization, or `None` for
    /// parallel hands and Stokes polarizations.
    pub fn conjugate_cross(self) -> Option<Polarization> {
        match self {
            Polarization::XY => Some(Polarization::YX),
            Polarization::YX => Some(Polarization::XY),
            Polarization::RL => Some(Polarization::LR),
            Polarization::LR => Some(Polarization::RL),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn cross_hands_have_conjugates() {
        assert_eq!(Polarization::XY.conjugate_cross(), Some(Polarization::YX));
        assert_eq!(Polarization::LR.conjugate_cross(), Some(Polarization::RL));
        assert_eq!(Polarization::XX.conjugate_cross(), None);
        assert_eq!(Polarization::StokesI.conjugate_cross(), None);
        assert!(Polarization::YX.is_cross());
        assert!(!Polarization::YY.is_cross());
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(Polarization::from_str("XX").unwrap(), Polarization::XX);
        assert_eq!(Polarization::from_str("I").unwrap(), Polarization::StokesI);
        assert_eq!(Polarization::StokesV.to_string(), "V");
    }
}
