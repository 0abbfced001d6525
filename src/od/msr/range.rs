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
use crate::md::ParameterDriver;
use crate::od::GroundStation;
use crate::time::Epoch;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, OHyperdual};
use snafu::ResultExt;

impl Measurement {
    /// A range measurement (km) from a ground station to the spacecraft of a propagator.
    pub fn range(
        station: GroundStation,
        epoch: Epoch,
        range_km: f64,
        sigma_km: f64,
        base_weight: f64,
        propagator: usize,
    ) -> Result<Self, MeasurementError> {
        Self::new(
            epoch,
            DVector::from_element(1, range_km),
            DVector::from_element(1, sigma_km),
            DVector::from_element(1, base_weight),
            vec![propagator],
            MeasurementModel::Range {
                station,
                bias: None,
            },
        )
    }

    /// Returns a copy of this range measurement with the provided bias driver, in km. Other measurements are
    /// returned unchanged.
    pub fn with_bias(mut self, driver: ParameterDriver) -> Self {
        if let MeasurementModel::Range { bias, .. } = &mut self.model {
            *bias = Some(driver);
        }
        self
    }
}

/// Name of the range bias driver of a station
pub fn range_bias_name(station: &GroundStation) -> String {
    format!("{} range bias", station.name)
}

/// Computes the range and its partials with respect to the relative state
pub(super) fn range_sensitivity(relative: &Vector6<f64>) -> (f64, DMatrix<f64>) {
    let hyperstate: Vector6<OHyperdual<f64, U7>> = hyperspace_from_vector(relative);
    let range_vec = hyperstate.fixed_rows::<3>(0).into_owned();
    let range = norm(&range_vec);

    let mut pmat = DMatrix::zeros(1, 6);
    for j in 1..7 {
        pmat[(0, j - 1)] = range[j];
    }
    (range.real(), pmat)
}

pub(super) fn estimate(
    epoch: Epoch,
    station: &GroundStation,
    state: &SpacecraftState,
    bias: Option<(String, f64)>,
) -> Result<EstimatedMeasurement, MeasurementError> {
    let tx = station
        .to_orbit(epoch)
        .context(MeasurementAstroSnafu {
            kind: MeasurementType::Range,
        })?;
    let relative = state.orbit.to_cartesian_pos_vel() - tx.to_cartesian_pos_vel();
    let (range_km, h_tilde) = range_sensitivity(&relative);

    let (value, parameter_partials) = match bias {
        Some((name, bias_km)) => (
            range_km + bias_km,
            vec![(name, DVector::from_element(1, 1.0))],
        ),
        None => (range_km, Vec::new()),
    };

    Ok(EstimatedMeasurement {
        epoch,
        value: DVector::from_element(1, value),
        state_partials: vec![h_tilde],
        parameter_partials,
    })
}
