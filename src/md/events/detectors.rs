/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

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

use super::{Detector, EventEvaluator};
use crate::cosmic::eclipse::EclipseLocator;
use crate::cosmic::{Frame, SpacecraftState};
use crate::errors::{EventAstroSnafu, EventError};
use crate::od::GroundStation;
use crate::time::Epoch;
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

/// Switching function of a date: the time elapsed since that date, in seconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DateEvaluator {
    pub epoch: Epoch,
}

impl DateEvaluator {
    pub fn new(epoch: Epoch) -> Self {
        Self { epoch }
    }
}

impl fmt::Display for DateEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "date {}", self.epoch)
    }
}

impl EventEvaluator for DateEvaluator {
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        Ok((state.epoch() - self.epoch).to_seconds())
    }
}

/// Switching function of the apsides: the dot product of the position and the velocity.
///
/// It increases through zero at periapsis and decreases through zero at apoapsis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ApsisEvaluator;

impl fmt::Display for ApsisEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "apsis")
    }
}

impl EventEvaluator for ApsisEvaluator {
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        Ok(state.orbit.radius_km.dot(&state.orbit.velocity_km_s))
    }
}

/// Switching function of the crossing of an altitude above the equatorial radius of the central body, in km.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AltitudeEvaluator {
    pub altitude_km: f64,
}

impl AltitudeEvaluator {
    pub fn new(altitude_km: f64) -> Self {
        Self { altitude_km }
    }
}

impl fmt::Display for AltitudeEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "altitude = {} km", self.altitude_km)
    }
}

impl EventEvaluator for AltitudeEvaluator {
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        let height_km = state
            .orbit
            .height_km()
            .context(EventAstroSnafu { event: self.to_string() })?;
        Ok(height_km - self.altitude_km)
    }
}

/// Switching function of an eclipse: negative while in the shadow of the body.
///
/// The switching function is the umbra function unless `penumbra` is set.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EclipseEvaluator {
    pub locator: EclipseLocator,
    pub penumbra: bool,
}

impl EclipseEvaluator {
    pub fn umbra(shadow_body: Frame) -> Self {
        Self {
            locator: EclipseLocator::new(shadow_body),
            penumbra: false,
        }
    }

    pub fn penumbra(shadow_body: Frame) -> Self {
        Self {
            locator: EclipseLocator::new(shadow_body),
            penumbra: true,
        }
    }
}

impl fmt::Display for EclipseEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            if self.penumbra { "penumbra" } else { "umbra" },
            self.locator
        )
    }
}

impl EventEvaluator for EclipseEvaluator {
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        if self.penumbra {
            self.locator.penumbra_function(&state.orbit)
        } else {
            self.locator.umbra_function(&state.orbit)
        }
        .context(EventAstroSnafu {
            event: self.to_string(),
        })
    }
}

/// Switching function of the visibility from a ground station: the elevation above the mask, in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationEvaluator {
    pub station: GroundStation,
}

impl ElevationEvaluator {
    pub fn new(station: GroundStation) -> Self {
        Self { station }
    }
}

impl fmt::Display for ElevationEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elevation from {} above {} deg",
            self.station.name, self.station.elevation_mask_deg
        )
    }
}

impl EventEvaluator for ElevationEvaluator {
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        let elevation_deg = self
            .station
            .elevation_deg(&state.orbit)
            .context(EventAstroSnafu {
                event: self.to_string(),
            })?;
        Ok(elevation_deg - self.station.elevation_mask_deg)
    }
}

/// Signature of the closures usable as switching functions
pub type SwitchingFunction = dyn Fn(&SpacecraftState) -> Result<f64, EventError> + Send + Sync;

/// A switching function provided as a closure
#[derive(Clone)]
pub struct FunctionEvaluator {
    pub name: String,
    pub function: Arc<SwitchingFunction>,
}

impl FunctionEvaluator {
    pub fn new<F>(name: &str, function: F) -> Self
    where
        F: Fn(&SpacecraftState) -> Result<f64, EventError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            function: Arc::new(function),
        }
    }
}

impl fmt::Display for FunctionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for FunctionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionEvaluator {{ name: {} }}", self.name)
    }
}

impl EventEvaluator for FunctionEvaluator {
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        (self.function)(state)
    }
}

pub type DateDetector = Detector<DateEvaluator>;
pub type ApsisDetector = Detector<ApsisEvaluator>;
pub type AltitudeDetector = Detector<AltitudeEvaluator>;
pub type EclipseDetector = Detector<EclipseEvaluator>;
pub type ElevationDetector = Detector<ElevationEvaluator>;
pub type FunctionDetector = Detector<FunctionEvaluator>;

impl DateDetector {
    pub fn date(epoch: Epoch) -> Self {
        Self::new(DateEvaluator::new(epoch))
    }
}

impl ApsisDetector {
    pub fn apsis() -> Self {
        Self::new(ApsisEvaluator)
    }
}

#[cfg(test)]
mod ut_detectors {
    use super::*;
    use crate::cosmic::{Orbit, EARTH_J2000};
    use crate::md::events::EventDetector;
    use crate::time::{TimeScale, Unit};

    fn state_at(ta_deg: f64) -> SpacecraftState {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        let orbit =
            Orbit::keplerian(8000.0, 0.1, 30.0, 0.0, 0.0, ta_deg, epoch, EARTH_J2000).unwrap();
        SpacecraftState::new(orbit, 100.0)
    }

    #[test]
    fn apsis_sign() {
        let apsis = ApsisDetector::apsis();
        // Between periapsis and apoapsis, the radius increases
        assert!(apsis.g(&state_at(90.0)).unwrap() > 0.0);
        assert!(apsis.g(&state_at(270.0)).unwrap() < 0.0);
        assert!(apsis.g(&state_at(0.0)).unwrap().abs() < 1e-9);
    }

    #[test]
    fn date_and_altitude() {
        let state = state_at(0.0);
        let date = DateDetector::date(state.epoch() + 10 * Unit::Second);
        assert!((date.g(&state).unwrap() + 10.0).abs() < 1e-9);

        // Periapsis radius is 7200 km
        let alt = Detector::new(AltitudeEvaluator::new(7200.0 - 6378.1366));
        assert!(alt.g(&state).unwrap().abs() < 1e-6);
        assert!(alt.g(&state_at(180.0)).unwrap() > 0.0);
    }

    #[test]
    fn closure_detector() {
        let detector = FunctionDetector::new(FunctionEvaluator::new("x axis", |state| {
            Ok(state.orbit.radius_km[1])
        }));
        assert_eq!(format!("{detector}"), "x axis");
        assert!(detector.g(&state_at(10.0)).unwrap() > 0.0);
    }
}
