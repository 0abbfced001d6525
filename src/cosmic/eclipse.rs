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

use super::{j2000_epoch, AstroError, Frame, Orbit, AU, SUN_J2000};
use crate::linalg::Vector3;
use crate::time::{Epoch, Unit};
use std::fmt;

/// Returns the position of the Sun with respect to the Earth in the J2000 frame, in km.
///
/// Low precision analytical model from the Astronomical Almanac, accurate to about 0.01 degrees between 1950 and 2050.
pub fn sun_position_km(epoch: Epoch) -> Vector3<f64> {
    let days = (epoch - j2000_epoch()).to_unit(Unit::Day);
    let mean_long_deg = 280.460 + 0.985_647_4 * days;
    let mean_anomaly = (357.528 + 0.985_600_3 * days).to_radians();
    let ecliptic_long =
        (mean_long_deg + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin())
            .to_radians();
    let obliquity = (23.439 - 4.0e-7 * days).to_radians();
    let dist_km =
        AU * (1.000_14 - 0.016_71 * mean_anomaly.cos() - 0.000_14 * (2.0 * mean_anomaly).cos());
    Vector3::new(
        dist_km * ecliptic_long.cos(),
        dist_km * obliquity.cos() * ecliptic_long.sin(),
        dist_km * obliquity.sin() * ecliptic_long.sin(),
    )
}

/// Eclipse state of an observer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EclipseState {
    Visible,
    Penumbra,
    Umbra,
}

/// Locates the eclipses of the Sun by the central body of the observer, which are both modeled as spheres.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EclipseLocator {
    pub light_source: Frame,
    pub shadow_body: Frame,
}

impl fmt::Display for EclipseLocator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "light-source: {}, shadow casted by: {}",
            self.light_source, self.shadow_body
        )
    }
}

impl EclipseLocator {
    /// Eclipses of the Sun by the provided central body
    pub fn new(shadow_body: Frame) -> Self {
        Self {
            light_source: SUN_J2000,
            shadow_body,
        }
    }

    /// Returns the angular separation between the light source and the shadow body as seen from the observer,
    /// along with the apparent angular radii of the light source and of the shadow body, all in radians.
    pub fn angles(&self, observer: &Orbit) -> Result<(f64, f64, f64), AstroError> {
        let r_sun = sun_position_km(observer.epoch);
        let to_sun = r_sun - observer.radius_km;
        let to_body = -observer.radius_km;
        let sun_radius_km = self.light_source.mean_equatorial_radius_km()?;
        let body_radius_km = self.shadow_body.mean_equatorial_radius_km()?;

        let separation = to_sun.angle(&to_body);
        let sun_ang_radius = (sun_radius_km / to_sun.norm()).min(1.0).asin();
        let body_ang_radius = (body_radius_km / to_body.norm()).min(1.0).asin();
        Ok((separation, sun_ang_radius, body_ang_radius))
    }

    /// Switching function of the umbra: negative when the observer is in full shadow
    pub fn umbra_function(&self, observer: &Orbit) -> Result<f64, AstroError> {
        let (separation, sun_ang_radius, body_ang_radius) = self.angles(observer)?;
        Ok(separation - (body_ang_radius - sun_ang_radius))
    }

    /// Switching function of the penumbra: negative when the Sun is at least partially occulted
    pub fn penumbra_function(&self, observer: &Orbit) -> Result<f64, AstroError> {
        let (separation, sun_ang_radius, body_ang_radius) = self.angles(observer)?;
        Ok(separation - (body_ang_radius + sun_ang_radius))
    }

    pub fn compute(&self, observer: &Orbit) -> Result<EclipseState, AstroError> {
        if self.umbra_function(observer)? < 0.0 {
            Ok(EclipseState::Umbra)
        } else if self.penumbra_function(observer)? < 0.0 {
            Ok(EclipseState::Penumbra)
        } else {
            Ok(EclipseState::Visible)
        }
    }
}

#[cfg(test)]
mod ut_eclipse {
    use super::*;
    use crate::cosmic::EARTH_J2000;
    use crate::time::TimeScale;

    #[test]
    fn sun_distance() {
        // Near perihelion in early January, near aphelion in early July
        let jan = Epoch::from_gregorian_at_midnight(2023, 1, 4, TimeScale::UTC);
        let jul = Epoch::from_gregorian_at_midnight(2023, 7, 6, TimeScale::UTC);
        assert!((sun_position_km(jan).norm() / AU - 0.9833).abs() < 1e-3);
        assert!((sun_position_km(jul).norm() / AU - 1.0167).abs() < 1e-3);
    }

    #[test]
    fn behind_the_earth() {
        let epoch = Epoch::from_gregorian_at_midnight(2023, 3, 21, TimeScale::UTC);
        let sun_dir = sun_position_km(epoch).normalize();
        let e_loc = EclipseLocator::new(EARTH_J2000);

        let shadowed = Orbit::from_position_velocity(
            -7000.0 * sun_dir,
            Vector3::zeros(),
            epoch,
            EARTH_J2000,
        );
        assert_eq!(e_loc.compute(&shadowed).unwrap(), EclipseState::Umbra);

        let lit = Orbit::from_position_velocity(7000.0 * sun_dir, Vector3::zeros(), epoch, EARTH_J2000);
        assert_eq!(e_loc.compute(&lit).unwrap(), EclipseState::Visible);
        assert!(e_loc.penumbra_function(&lit).unwrap() > e_loc.umbra_function(&shadowed).unwrap());
    }
}
