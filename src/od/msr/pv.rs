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

use super::{EstimatedMeasurement, Measurement, MeasurementError, MeasurementModel};
use crate::cosmic::SpacecraftState;
use crate::linalg::{DMatrix, DVector, Vector3};
use crate::time::Epoch;

impl Measurement {
    /// A direct observation of the position (km) and velocity (km/s) of the spacecraft of a propagator.
    pub fn pv(
        epoch: Epoch,
        position_km: Vector3<f64>,
        velocity_km_s: Vector3<f64>,
        sigma_position_km: f64,
        sigma_velocity_km_s: f64,
        base_weight: f64,
        propagator: usize,
    ) -> Result<Self, MeasurementError> {
        let mut sigma = DVector::from_element(6, sigma_position_km);
        sigma.rows_mut(3, 3).fill(sigma_velocity_km_s);
        Self::new(
            epoch,
            DVector::from_iterator(6, position_km.iter().chain(velocity_km_s.iter()).copied()),
            sigma,
            DVector::from_element(6, base_weight),
            vec![propagator],
            MeasurementModel::PV,
        )
    }
}

pub(super) fn estimate(epoch: Epoch, state: &SpacecraftState) -> EstimatedMeasurement {
    let pos_vel = state.orbit.to_cartesian_pos_vel();
    EstimatedMeasurement {
        epoch,
        value: DVector::from_column_slice(pos_vel.as_slice()),
        state_partials: vec![DMatrix::identity(6, 6)],
        parameter_partials: Vec::new(),
    }
}
