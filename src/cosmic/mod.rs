/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2023 Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::time::{Epoch, TimeScale};
use snafu::Snafu;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("{action}: frame {frame} is missing {data}"))]
    MissingFrameData {
        action: &'static str,
        data: &'static str,
        frame: Frame,
    },
    #[snafu(display("{action}: orbit is not elliptical (ecc = {ecc}, sma = {sma_km} km)"))]
    NotElliptical {
        action: &'static str,
        ecc: f64,
        sma_km: f64,
    },
    #[snafu(display("singular elements: {action}"))]
    SingularElements { action: &'static str },
    #[snafu(display(
        "Kepler equation did not converge for mean longitude {mean_longitude_rad} rad after {iterations} iterations"
    ))]
    KeplerSolver {
        mean_longitude_rad: f64,
        iterations: usize,
    },
    #[snafu(display("frames {frame1} and {frame2} differ: {action}"))]
    FrameMismatch {
        action: &'static str,
        frame1: Frame,
        frame2: Frame,
    },
}

/// Reference epoch of the J2000 frames and of the body rotation models (2000-01-01T12:00:00 TT)
pub fn j2000_epoch() -> Epoch {
    Epoch::from_gregorian_at_noon(2000, 1, 1, TimeScale::TT)
}

mod frames;
pub use self::frames::*;

mod elements;
pub use self::elements::*;

mod orbit;
pub use self::orbit::*;

mod attitude;
pub use self::attitude::*;

mod spacecraft;
pub use self::spacecraft::*;

/// The eclipse module allows finding eclipses of the Sun by the central body, using an analytical Sun position.
pub mod eclipse;

/// Speed of light in kilometers per second
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Astronomical unit, in kilometers, according to the [IAU](https://www.iau.org/public/themes/measuring/).
pub const AU: f64 = 149_597_870.700;

pub fn assert_orbit_eq_or_abs(left: &Orbit, right: &Orbit, epsilon: f64, msg: &str) {
    if !left.eq_within(right, epsilon, epsilon) {
        panic!(
            r#"assertion failed: `(left == right)`
  left: `{left}`,
 right: `{right}`: {msg}"#
        )
    }
}
