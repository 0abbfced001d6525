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
    EstimatedMeasurement, Measurement, MeasurementAstroSnafu, MeasurementError, MeasurementModel,
    MeasurementType,
};
use crate::cosmic::SpacecraftState;
use crate::linalg::{DMatrix, DVector, Vector6, U7};
use crate::od::GroundStation;
use crate::time::Epoch;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, OHyperdual};
use snafu::ResultExt;

impl Measurement {
    /// A range rate measurement (km/s) from a ground station to the spacecraft of a propagator, positive when the
    /// spacecraft moves away from the station.
    pub fn range_rate(
        station: GroundStation,
        epoch: Epoch,
        range_rate_km_s: f64,
        sigma_km_s: f64,
        base_weight: f64,
        propagator: usize,
    ) -> Result<Self, MeasurementError> {
        Self::new(
            epoch,
            DVector::from_element(1, range_rate_km_s),
            DVector::from_element(1, sigma_km_s),
            DVector::from_element(1, base_weight),
            vec![propagator],
            MeasurementModel::RangeRate { station },
        )
    }
}

fn compute_sensitivity(relative: &Vector6<f64>) -> (f64, DMatrix<f64>) {
    // Extract data from hyperspace
    let state: Vector6<OHyperdual<f64, U7>> = hyperspace_from_vector(relative);
    let range_vec = state.fixed_rows::<3>(0).into_owned();
    let velocity_vec = state.fixed_rows::<3>(3).into_owned();

    // Code up math as usual
    let delta_v_vec = velocity_vec / norm(&range_vec);
    let range_rate = range_vec.dot(&delta_v_vec);

    let mut pmat = DMatrix::zeros(1, 6);
    for j in 1..7 {
        pmat[(0, j - 1)] = range_rate[j];
    }
    (range_rate.real(), pmat)
}

pub(super) fn estimate(
    epoch: Epoch,
    station: &GroundStation,
    state: &SpacecraftState,
) -> Result<EstimatedMeasurement, MeasurementError> {
    let tx = station
        .to_orbit(epoch)
        .context(MeasurementAstroSnafu {
            kind: MeasurementType::RangeRate,
        })?;
    let (range_rate, h_tilde) =
        compute_sensitivity(&(state.orbit.to_cartesian_pos_vel() - tx.to_cartesian_pos_vel()));

    Ok(EstimatedMeasurement {
        epoch,
        value: DVector::from_element(1, range_rate),
        state_partials: vec![h_tilde],
        parameter_partials: Vec::new(),
    })
}
