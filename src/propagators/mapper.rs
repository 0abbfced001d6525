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

use super::{
    InconsistentJacobianSnafu, PropAstroSnafu, PropConfigSnafu, PropagationError,
    StateLengthSnafu,
};
use crate::cosmic::{
    cartesian_partials, elements_and_partials, AngleType, AstroError, AttitudeProvider, Frame,
    Orbit, OrbitType, SpacecraftState,
};
use crate::errors::ConfigAstroSnafu;
use crate::linalg::{DMatrix, DVector, Matrix6, Vector6};
use crate::time::{Epoch, Unit};
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::sync::Arc;

/// Index of the mass in the raw state vector
pub const MASS_INDEX: usize = 6;

/// Layout of the raw state vector: the six orbital components, the mass, the additional parameters and
/// optionally the Jacobian block, stored column major.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLayout {
    pub additional_len: usize,
    /// Names of the sensitivity parameters, i.e. the extra columns of the Jacobian
    pub parameters: Vec<String>,
    pub with_jacobian: bool,
}

impl StateLayout {
    /// Layout of the orbit, mass and additional parameters only
    pub fn new(additional_len: usize) -> Self {
        Self {
            additional_len,
            parameters: Vec::new(),
            with_jacobian: false,
        }
    }

    /// Layout which also carries the Jacobian with respect to the initial elements and the provided parameters
    pub fn with_jacobian(additional_len: usize, parameters: Vec<String>) -> Self {
        Self {
            additional_len,
            parameters,
            with_jacobian: true,
        }
    }

    pub fn additional_offset(&self) -> usize {
        MASS_INDEX + 1
    }

    pub fn jacobian_offset(&self) -> usize {
        self.additional_offset() + self.additional_len
    }

    /// Number of columns of the Jacobian: six initial elements plus one per parameter
    pub fn jacobian_cols(&self) -> usize {
        6 + self.parameters.len()
    }

    /// Total length of the raw state vector
    pub fn len(&self) -> usize {
        self.jacobian_offset()
            + if self.with_jacobian {
                6 * self.jacobian_cols()
            } else {
                0
            }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects which elements are decoded. Numerical integration has no short period model: the raw elements are
/// osculating and both selections decode to the same state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropagationType {
    Mean,
    Osculating,
}

/// The state mapper converts between a spacecraft state and the raw vector integrated by the propagator, and
/// between epochs and the elapsed seconds since its reference epoch.
///
/// The orbit and angle types are fixed at construction, so a vector must be decoded by the mapper which encoded it.
#[derive(Clone, Debug)]
pub struct StateMapper {
    reference_epoch: Epoch,
    frame: Frame,
    mu_km3_s2: f64,
    orbit_type: OrbitType,
    angle_type: AngleType,
    attitude: Arc<dyn AttitudeProvider>,
    layout: StateLayout,
    drag_area_m2: f64,
}

impl StateMapper {
    /// Builds a new mapper, which fails if the frame has no gravitational parameter.
    pub fn new(
        reference_epoch: Epoch,
        frame: Frame,
        orbit_type: OrbitType,
        angle_type: AngleType,
        attitude: Arc<dyn AttitudeProvider>,
        layout: StateLayout,
    ) -> Result<Self, PropagationError> {
        let mu_km3_s2 = frame
            .mu_km3_s2()
            .context(ConfigAstroSnafu)
            .context(PropConfigSnafu)?;
        Ok(Self {
            reference_epoch,
            frame,
            mu_km3_s2,
            orbit_type,
            angle_type,
            attitude,
            layout,
            drag_area_m2: 0.0,
        })
    }

    /// Sets the drag area of the decoded states, as it is not integrated
    pub fn with_drag_area(mut self, drag_area_m2: f64) -> Self {
        self.drag_area_m2 = drag_area_m2;
        self
    }

    pub fn reference_epoch(&self) -> Epoch {
        self.reference_epoch
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn orbit_type(&self) -> OrbitType {
        self.orbit_type
    }

    pub fn angle_type(&self) -> AngleType {
        self.angle_type
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Converts the elapsed seconds since the reference epoch into an epoch
    pub fn map_double_to_date(&self, t: f64) -> Epoch {
        self.reference_epoch + t * Unit::Second
    }

    /// Converts the elapsed seconds into an epoch, returning the expected epoch unchanged if it maps exactly to `t`.
    pub fn map_double_to_date_expected(&self, t: f64, expected: Epoch) -> Epoch {
        if self.map_date_to_double(expected) == t {
            expected
        } else {
            self.map_double_to_date(t)
        }
    }

    /// Converts an epoch into the elapsed seconds since the reference epoch
    pub fn map_date_to_double(&self, epoch: Epoch) -> f64 {
        (epoch - self.reference_epoch).to_seconds()
    }

    /// Encodes the state into the provided raw vector, whose length must match the layout.
    ///
    /// A state without a Jacobian is encoded with the partials of its Cartesian state with respect to its elements,
    /// and zero partials with respect to the parameters.
    pub fn map_state_to_array(
        &self,
        state: &SpacecraftState,
        y: &mut DVector<f64>,
    ) -> Result<(), PropagationError> {
        let layout = &self.layout;
        ensure!(
            y.len() == layout.len(),
            StateLengthSnafu {
                expected: layout.len(),
                got: y.len()
            }
        );
        ensure!(
            state.additional.len() == layout.additional_len,
            StateLengthSnafu {
                expected: layout.additional_len,
                got: state.additional.len()
            }
        );
        if !state.orbit.frame.ephem_orient_matches(self.frame) {
            return Err(AstroError::FrameMismatch {
                action: "encoding a state",
                frame1: self.frame,
                frame2: state.orbit.frame,
            })
            .context(PropAstroSnafu);
        }

        let (elements, _) = elements_and_partials(
            &state.orbit.to_cartesian_pos_vel(),
            self.mu_km3_s2,
            self.orbit_type,
            self.angle_type,
        )
        .context(PropAstroSnafu)?;
        for i in 0..6 {
            y[i] = elements[i];
        }
        y[MASS_INDEX] = state.mass_kg;
        let offset = layout.additional_offset();
        for (i, value) in state.additional.iter().enumerate() {
            y[offset + i] = *value;
        }

        if layout.with_jacobian {
            let cols = layout.jacobian_cols();
            let jacobian = match &state.jacobian {
                Some(jacobian) => {
                    ensure!(
                        jacobian.nrows() == 6 && jacobian.ncols() == cols,
                        InconsistentJacobianSnafu {
                            rows: jacobian.nrows(),
                            cols: jacobian.ncols(),
                            expected_cols: cols
                        }
                    );
                    jacobian.clone()
                }
                None => {
                    let mut jacobian = DMatrix::zeros(6, cols);
                    jacobian
                        .view_mut((0, 0), (6, 6))
                        .copy_from(&self.initial_jacobian(&state.orbit)?);
                    jacobian
                }
            };
            let offset = layout.jacobian_offset();
            // Column major, as nalgebra stores it
            for (i, value) in jacobian.iter().enumerate() {
                y[offset + i] = *value;
            }
        }

        Ok(())
    }

    /// Decodes the raw vector at `t` seconds past the reference epoch.
    pub fn map_array_to_state(
        &self,
        t: f64,
        y: &DVector<f64>,
        _propagation_type: PropagationType,
    ) -> Result<SpacecraftState, PropagationError> {
        self.decode(self.map_double_to_date(t), y, self.layout.with_jacobian)
    }

    /// Decodes the raw vector at the provided epoch, optionally skipping the Jacobian block
    pub(crate) fn decode(
        &self,
        epoch: Epoch,
        y: &DVector<f64>,
        with_jacobian: bool,
    ) -> Result<SpacecraftState, PropagationError> {
        let layout = &self.layout;
        ensure!(
            y.len() == layout.len(),
            StateLengthSnafu {
                expected: layout.len(),
                got: y.len()
            }
        );
        let elements = Vector6::from_iterator(y.rows(0, 6).iter().cloned());
        let orbit = Orbit::from_elements(
            &elements,
            self.orbit_type,
            self.angle_type,
            epoch,
            self.frame,
        )
        .context(PropAstroSnafu)?;

        let offset = layout.additional_offset();
        let additional = y.rows(offset, layout.additional_len).iter().cloned().collect();

        let jacobian = if with_jacobian && layout.with_jacobian {
            let cols = layout.jacobian_cols();
            let offset = layout.jacobian_offset();
            Some(DMatrix::from_column_slice(
                6,
                cols,
                &y.as_slice()[offset..offset + 6 * cols],
            ))
        } else {
            None
        };

        Ok(SpacecraftState {
            attitude: self.attitude.attitude(&orbit),
            orbit,
            mass_kg: y[MASS_INDEX],
            drag_area_m2: self.drag_area_m2,
            additional,
            jacobian,
        })
    }

    /// Rates of the elements, from the rates of the Cartesian state
    pub fn orbit_rates(
        &self,
        orbit: &Orbit,
        pos_vel_rates: &Vector6<f64>,
    ) -> Result<Vector6<f64>, PropagationError> {
        if self.orbit_type == OrbitType::Cartesian {
            return Ok(*pos_vel_rates);
        }
        let (_, de_dx) = elements_and_partials(
            &orbit.to_cartesian_pos_vel(),
            self.mu_km3_s2,
            self.orbit_type,
            self.angle_type,
        )
        .context(PropAstroSnafu)?;
        Ok(de_dx * pos_vel_rates)
    }

    /// Partials of the Cartesian state with respect to the elements of this mapper
    pub fn initial_jacobian(&self, orbit: &Orbit) -> Result<Matrix6<f64>, PropagationError> {
        cartesian_partials(
            &orbit.to_cartesian_pos_vel(),
            self.mu_km3_s2,
            self.orbit_type,
            self.angle_type,
        )
        .context(PropAstroSnafu)
    }
}

impl fmt::Display for StateMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} elements ({} angle) in {} from {}",
            self.orbit_type, self.angle_type, self.frame, self.reference_epoch
        )
    }
}

#[cfg(test)]
mod ut_mapper {
    use super::*;
    use crate::cosmic::{InertialAttitude, EARTH_J2000, EARTH, J2000};
    use crate::time::TimeScale;

    fn state() -> SpacecraftState {
        let epoch = Epoch::from_gregorian_utc_hms(2021, 3, 4, 5, 6, 7);
        let orbit =
            Orbit::keplerian(7200.0, 0.05, 51.6, 30.0, 45.0, 120.0, epoch, EARTH_J2000).unwrap();
        SpacecraftState::new(orbit, 250.0)
            .with_drag_area(3.0)
            .with_additional(vec![1.5, -2.5])
    }

    fn mapper(orbit_type: OrbitType, angle_type: AngleType, layout: StateLayout) -> StateMapper {
        StateMapper::new(
            state().epoch(),
            EARTH_J2000,
            orbit_type,
            angle_type,
            Arc::new(InertialAttitude::default()),
            layout,
        )
        .unwrap()
        .with_drag_area(3.0)
    }

    #[test]
    fn missing_mu() {
        let err = StateMapper::new(
            state().epoch(),
            Frame::new(EARTH, J2000),
            OrbitType::Keplerian,
            AngleType::True,
            Arc::new(InertialAttitude::default()),
            StateLayout::new(0),
        )
        .unwrap_err();
        assert!(matches!(err, PropagationError::PropConfigError { .. }));
    }

    #[test]
    fn round_trip_all_types() {
        let state = state();
        for orbit_type in [
            OrbitType::Cartesian,
            OrbitType::Keplerian,
            OrbitType::Circular,
            OrbitType::Equinoctial,
        ] {
            for angle_type in [AngleType::Mean, AngleType::Eccentric, AngleType::True] {
                let mapper = mapper(orbit_type, angle_type, StateLayout::new(2));
                let mut y = DVector::zeros(mapper.layout().len());
                mapper.map_state_to_array(&state, &mut y).unwrap();
                for propagation_type in [PropagationType::Mean, PropagationType::Osculating] {
                    let decoded = mapper.map_array_to_state(0.0, &y, propagation_type).unwrap();
                    assert_eq!(decoded.epoch(), state.epoch());
                    assert!(
                        (decoded.orbit.radius_km - state.orbit.radius_km).norm() < 1e-8,
                        "{orbit_type} {angle_type}"
                    );
                    assert!(
                        (decoded.orbit.velocity_km_s - state.orbit.velocity_km_s).norm() < 1e-11,
                        "{orbit_type} {angle_type}"
                    );
                    assert_eq!(decoded.mass_kg, state.mass_kg);
                    assert_eq!(decoded.additional, state.additional);
                    assert_eq!(decoded.drag_area_m2, state.drag_area_m2);
                }
            }
        }
    }

    #[test]
    fn time_mapping() {
        let mapper = mapper(OrbitType::Cartesian, AngleType::True, StateLayout::new(0));
        let later = Epoch::from_gregorian(2021, 3, 4, 5, 6, 7, 123_456_789, TimeScale::UTC);
        let t = mapper.map_date_to_double(later);
        assert!((t - 0.123_456_789).abs() < 1e-12);
        assert_eq!(mapper.map_double_to_date_expected(t, later), later);
        assert_eq!(mapper.map_double_to_date(0.0), mapper.reference_epoch());
    }

    #[test]
    fn jacobian_block() {
        let state = state();
        let layout = StateLayout::with_jacobian(2, vec!["Cd".to_string()]);
        assert_eq!(layout.len(), 6 + 1 + 2 + 6 * 7);

        let mapper = mapper(OrbitType::Equinoctial, AngleType::Mean, layout);
        let mut y = DVector::zeros(mapper.layout().len());
        mapper.map_state_to_array(&state, &mut y).unwrap();
        let decoded = mapper
            .map_array_to_state(0.0, &y, PropagationType::Osculating)
            .unwrap();
        let jacobian = decoded.jacobian.unwrap();
        let (_, de_dx) = state
            .orbit
            .element_partials(OrbitType::Equinoctial, AngleType::Mean)
            .unwrap();
        // The initial Jacobian is the inverse of the element partials, and the parameter column is zero
        let product = de_dx * Matrix6::from_iterator(jacobian.view((0, 0), (6, 6)).iter().cloned());
        assert!((product - Matrix6::identity()).norm() < 1e-8);
        assert_eq!(jacobian.column(6).norm(), 0.0);

        let bad = state.with_jacobian(DMatrix::zeros(6, 6));
        assert_eq!(
            mapper.map_state_to_array(&bad, &mut y).unwrap_err(),
            PropagationError::InconsistentJacobian {
                rows: 6,
                cols: 6,
                expected_cols: 7
            }
        );
    }

    #[test]
    fn element_rates() {
        let state = state();
        let mapper = mapper(OrbitType::Keplerian, AngleType::Mean, StateLayout::new(2));
        let mu = EARTH_J2000.mu_km3_s2.unwrap();
        let r = state.orbit.rmag_km();
        let mut rates = Vector6::zeros();
        for i in 0..3 {
            rates[i] = state.orbit.velocity_km_s[i];
            rates[i + 3] = -mu / r.powi(3) * state.orbit.radius_km[i];
        }
        let kep_rates = mapper.orbit_rates(&state.orbit, &rates).unwrap();
        // Under two body dynamics, only the mean anomaly drifts at the mean motion
        for i in 0..5 {
            assert!(kep_rates[i].abs() < 1e-9, "rate {i} = {}", kep_rates[i]);
        }
        let n = state.orbit.mean_motion_rad_s().unwrap();
        assert!((kep_rates[5] - n).abs() < 1e-12);
    }
}
