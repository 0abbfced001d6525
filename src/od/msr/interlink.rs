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

use super::range::range_sensitivity;
use super::{EstimatedMeasurement, Measurement, MeasurementError, MeasurementModel};
use crate::cosmic::SpacecraftState;
use crate::linalg::DVector;
use crate::time::Epoch;

impl Measurement {
    /// A range measurement (km) between the spacecraft of two propagators.
    pub fn inter_satellite_range(
        epoch: Epoch,
        range_km: f64,
        sigma_km: f64,
        base_weight: f64,
        local: usize,
        remote: usize,
    ) -> Result<Self, MeasurementError> {
        Self::new(
            epoch,
            DVector::from_element(1, range_km),
            DVector::from_element(1, sigma_km),
            DVector::from_element(1, base_weight),
            vec![local, remote],
            MeasurementModel::InterSatelliteRange,
        )
    }
}

pub(super) fn estimate(
    epoch: Epoch,
    local: &SpacecraftState,
    remote: &SpacecraftState,
) -> EstimatedMeasurement {
    let relative = local.orbit.to_cartesian_pos_vel() - remote.orbit.to_cartesian_pos_vel();
    let (range_km, h_local) = range_sensitivity(&relative);
    let h_remote = -&h_local;
    EstimatedMeasurement {
        epoch,
        value: DVector::from_element(1, range_km),
        state_partials: vec![h_local, h_remote],
        parameter_partials: Vec::new(),
    }
}
