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

use super::{Action, EventHandler};
use crate::cosmic::{LvlhAttitude, SpacecraftState};
use crate::errors::EventError;
use crate::linalg::Vector3;
use std::sync::{Arc, Mutex};

/// Continue the propagation at every event
#[derive(Copy, Clone, Debug, Default)]
pub struct ContinueOnEvent;

impl EventHandler for ContinueOnEvent {
    fn event_occurred(&self, _: &SpacecraftState, _: bool) -> Result<Action, EventError> {
        Ok(Action::Continue)
    }
}

/// Stop the propagation at the first event
#[derive(Copy, Clone, Debug, Default)]
pub struct StopOnEvent;

impl EventHandler for StopOnEvent {
    fn event_occurred(&self, _: &SpacecraftState, _: bool) -> Result<Action, EventError> {
        Ok(Action::Stop)
    }
}

/// Restarts the integration at every event with freshly computed derivatives, e.g. when the dynamics switch
/// regime at the event
#[derive(Copy, Clone, Debug, Default)]
pub struct ResetDerivativesOnEvent;

impl EventHandler for ResetDerivativesOnEvent {
    fn event_occurred(&self, _: &SpacecraftState, _: bool) -> Result<Action, EventError> {
        Ok(Action::ResetDerivatives)
    }
}

/// Stop the propagation when the switching function increases, continue otherwise
#[derive(Copy, Clone, Debug, Default)]
pub struct StopOnIncreasing;

impl EventHandler for StopOnIncreasing {
    fn event_occurred(&self, _: &SpacecraftState, increasing: bool) -> Result<Action, EventError> {
        Ok(if increasing {
            Action::Stop
        } else {
            Action::Continue
        })
    }
}

/// Stop the propagation when the switching function decreases, continue otherwise
#[derive(Copy, Clone, Debug, Default)]
pub struct StopOnDecreasing;

impl EventHandler for StopOnDecreasing {
    fn event_occurred(&self, _: &SpacecraftState, increasing: bool) -> Result<Action, EventError> {
        Ok(if increasing {
            Action::Continue
        } else {
            Action::Stop
        })
    }
}

/// Stores the state of each event and continues the propagation.
///
/// The records are shared between the clones of this handler.
#[derive(Clone, Debug, Default)]
pub struct RecordAndContinue {
    records: Arc<Mutex<Vec<(SpacecraftState, bool)>>>,
}

impl RecordAndContinue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded states, with whether the switching function was increasing
    pub fn records(&self) -> Vec<(SpacecraftState, bool)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventHandler for RecordAndContinue {
    fn event_occurred(
        &self,
        state: &SpacecraftState,
        increasing: bool,
    ) -> Result<Action, EventError> {
        self.records
            .lock()
            .map_err(|e| EventError::HandlerFailed {
                event: "record".to_string(),
                msg: e.to_string(),
            })?
            .push((state.clone(), increasing));
        Ok(Action::Continue)
    }
}

/// Applies an impulsive velocity change at every event, by resetting the state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImpulsiveManeuver {
    /// Velocity increment in km/s
    pub dv_km_s: Vector3<f64>,
    /// If set, the increment is expressed in the local vertical, local horizontal frame instead of the inertial frame
    pub lvlh: bool,
}

impl ImpulsiveManeuver {
    pub fn inertial(dv_km_s: Vector3<f64>) -> Self {
        Self {
            dv_km_s,
            lvlh: false,
        }
    }

    pub fn lvlh(dv_km_s: Vector3<f64>) -> Self {
        Self {
            dv_km_s,
            lvlh: true,
        }
    }
}

impl EventHandler for ImpulsiveManeuver {
    fn event_occurred(&self, state: &SpacecraftState, _: bool) -> Result<Action, EventError> {
        let dv_km_s = if self.lvlh {
            LvlhAttitude::dcm_from_inertial(&state.orbit).transpose() * self.dv_km_s
        } else {
            self.dv_km_s
        };
        info!(
            "impulsive maneuver of {:.6} m/s @ {}",
            dv_km_s.norm() * 1e3,
            state.epoch()
        );
        Ok(Action::ResetState(state.clone().with_dv_km_s(dv_km_s)))
    }
}

#[cfg(test)]
mod ut_handlers {
    use super::*;
    use crate::cosmic::{Orbit, EARTH_J2000};
    use crate::time::{Epoch, TimeScale};

    fn state() -> SpacecraftState {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        let orbit = Orbit::keplerian(7000.0, 0.0, 0.0, 0.0, 0.0, 0.0, epoch, EARTH_J2000).unwrap();
        SpacecraftState::new(orbit, 100.0)
    }

    #[test]
    fn directional_stops() {
        let state = state();
        assert_eq!(
            StopOnIncreasing.event_occurred(&state, true).unwrap(),
            Action::Stop
        );
        assert_eq!(
            StopOnIncreasing.event_occurred(&state, false).unwrap(),
            Action::Continue
        );
        assert_eq!(
            StopOnDecreasing.event_occurred(&state, false).unwrap(),
            Action::Stop
        );
        assert_eq!(
            ResetDerivativesOnEvent.event_occurred(&state, true).unwrap(),
            Action::ResetDerivatives
        );
    }

    #[test]
    fn record_is_shared() {
        let state = state();
        let handler = RecordAndContinue::new();
        let clone = handler.clone();
        clone.event_occurred(&state, true).unwrap();
        clone.event_occurred(&state, false).unwrap();
        let records = handler.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].1 && !records[1].1);
    }

    #[test]
    fn prograde_lvlh_burn() {
        let state = state();
        let mnvr = ImpulsiveManeuver::lvlh(Vector3::new(0.0, 0.01, 0.0));
        match mnvr.event_occurred(&state, true).unwrap() {
            Action::ResetState(new_state) => {
                // Circular equatorial orbit at the ascending node: the along track direction is +Y
                let dv = new_state.orbit.velocity_km_s - state.orbit.velocity_km_s;
                assert!((dv - Vector3::new(0.0, 0.01, 0.0)).norm() < 1e-12);
                assert_eq!(new_state.epoch(), state.epoch());
            }
            other => panic!("expected a reset, got {other:?}"),
        }
    }
}
