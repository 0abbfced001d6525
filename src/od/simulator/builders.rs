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

use crate::cosmic::SpacecraftState;
use crate::md::ParameterDriver;
use crate::od::msr::{Measurement, MeasurementAstroSnafu, MeasurementError, MeasurementType};
use crate::od::GroundStation;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use snafu::ResultExt;
use std::fmt;

/// Builds measurements from the states of the propagators, optionally adding Gaussian noise.
///
/// The states are provided for all the propagators, indexed by propagator.
pub trait MeasurementBuilder: fmt::Display + Send + Sync {
    fn kind(&self) -> MeasurementType;

    /// Indices of the propagators whose states are measured
    fn propagators(&self) -> Vec<usize>;

    /// Returns false if the measurement cannot be taken from these states, e.g. below the elevation mask
    fn is_visible(&self, _states: &[SpacecraftState]) -> Result<bool, MeasurementError> {
        Ok(true)
    }

    /// Builds the measurement, with noise if a random number generator is provided
    fn build(
        &self,
        states: &[SpacecraftState],
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<Measurement, MeasurementError>;
}

/// Picks the states of the provided propagators
fn select<'s>(
    kind: MeasurementType,
    states: &'s [SpacecraftState],
    propagators: &[usize],
) -> Result<Vec<&'s SpacecraftState>, MeasurementError> {
    propagators
        .iter()
        .map(|&index| {
            states
                .get(index)
                .ok_or_else(|| MeasurementError::InvalidMeasurement {
                    kind,
                    msg: format!("no state for propagator #{index} among {} states", states.len()),
                })
        })
        .collect()
}

/// Builds the perfect measurement from the states, then adds a sample of the noise on each component.
fn noisy(
    perfect: Measurement,
    states: &[SpacecraftState],
    rng: Option<&mut Pcg64Mcg>,
) -> Result<Measurement, MeasurementError> {
    let kind = perfect.kind();
    let selected = select(kind, states, &perfect.propagators)?;
    let mut measurement = perfect.clone();
    measurement.observed = perfect.estimate(&selected, &[])?.value;

    if let Some(rng) = rng {
        for (value, sigma) in measurement.observed.iter_mut().zip(perfect.sigma.iter()) {
            let normal = Normal::new(0.0, *sigma).map_err(|e| MeasurementError::InvalidMeasurement {
                kind,
                msg: e.to_string(),
            })?;
            *value += normal.sample(&mut *rng);
        }
    }
    Ok(measurement)
}

/// Builds position and velocity measurements of a spacecraft.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PVBuilder {
    pub sigma_position_km: f64,
    pub sigma_velocity_km_s: f64,
    pub base_weight: f64,
    pub propagator: usize,
}

impl fmt::Display for PVBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PV of #{} (σ = {} km, {} km/s)",
            self.propagator, self.sigma_position_km, self.sigma_velocity_km_s
        )
    }
}

impl MeasurementBuilder for PVBuilder {
    fn kind(&self) -> MeasurementType {
        MeasurementType::PV
    }

    fn propagators(&self) -> Vec<usize> {
        vec![self.propagator]
    }

    fn build(
        &self,
        states: &[SpacecraftState],
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<Measurement, MeasurementError> {
        let state = select(self.kind(), states, &[self.propagator])?[0];
        let perfect = Measurement::pv(
            state.epoch(),
            state.orbit.radius_km,
            state.orbit.velocity_km_s,
            self.sigma_position_km,
            self.sigma_velocity_km_s,
            self.base_weight,
            self.propagator,
        )?;
        noisy(perfect, states, rng)
    }
}

/// Builds range measurements from a ground station, when the spacecraft is above its elevation mask.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeBuilder {
    pub station: GroundStation,
    pub sigma_km: f64,
    pub base_weight: f64,
    pub propagator: usize,
    /// Bias added to the simulated ranges, which is also attached to the measurements
    pub bias: Option<ParameterDriver>,
}

impl fmt::Display for RangeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "range of #{} from {} (σ = {} km)",
            self.propagator, self.station.name, self.sigma_km
        )
    }
}

impl MeasurementBuilder for RangeBuilder {
    fn kind(&self) -> MeasurementType {
        MeasurementType::Range
    }

    fn propagators(&self) -> Vec<usize> {
        vec![self.propagator]
    }

    fn is_visible(&self, states: &[SpacecraftState]) -> Result<bool, MeasurementError> {
        let state = select(self.kind(), states, &[self.propagator])?[0];
        self.station
            .is_visible(&state.orbit)
            .context(MeasurementAstroSnafu { kind: self.kind() })
    }

    fn build(
        &self,
        states: &[SpacecraftState],
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<Measurement, MeasurementError> {
        let state = select(self.kind(), states, &[self.propagator])?[0];
        let mut perfect = Measurement::range(
            self.station.clone(),
            state.epoch(),
            0.0,
            self.sigma_km,
            self.base_weight,
            self.propagator,
        )?;
        if let Some(bias) = &self.bias {
            perfect = perfect.with_bias(bias.clone());
        }
        noisy(perfect, states, rng)
    }
}

/// Builds range rate measurements from a ground station, when the spacecraft is above its elevation mask.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeRateBuilder {
    pub station: GroundStation,
    pub sigma_km_s: f64,
    pub base_weight: f64,
    pub propagator: usize,
}

impl fmt::Display for RangeRateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "range rate of #{} from {} (σ = {} km/s)",
            self.propagator, self.station.name, self.sigma_km_s
        )
    }
}

impl MeasurementBuilder for RangeRateBuilder {
    fn kind(&self) -> MeasurementType {
        MeasurementType::RangeRate
    }

    fn propagators(&self) -> Vec<usize> {
        vec![self.propagator]
    }

    fn is_visible(&self, states: &[SpacecraftState]) -> Result<bool, MeasurementError> {
        let state = select(self.kind(), states, &[self.propagator])?[0];
        self.station
            .is_visible(&state.orbit)
            .context(MeasurementAstroSnafu { kind: self.kind() })
    }

    fn build(
        &self,
        states: &[SpacecraftState],
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<Measurement, MeasurementError> {
        let state = select(self.kind(), states, &[self.propagator])?[0];
        let perfect = Measurement::range_rate(
            self.station.clone(),
            state.epoch(),
            0.0,
            self.sigma_km_s,
            self.base_weight,
            self.propagator,
        )?;
        noisy(perfect, states, rng)
    }
}

/// Builds range measurements between two spacecraft.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InterSatelliteRangeBuilder {
    pub sigma_km: f64,
    pub base_weight: f64,
    pub local: usize,
    pub remote: usize,
}

impl fmt::Display for InterSatelliteRangeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "range between #{} and #{} (σ = {} km)",
            self.local, self.remote, self.sigma_km
        )
    }
}

impl MeasurementBuilder for InterSatelliteRangeBuilder {
    fn kind(&self) -> MeasurementType {
        MeasurementType::InterSatelliteRange
    }

    fn propagators(&self) -> Vec<usize> {
        vec![self.local, self.remote]
    }

    fn build(
        &self,
        states: &[SpacecraftState],
        rng: Option<&mut Pcg64Mcg>,
    ) -> Result<Measurement, MeasurementError> {
        let epoch = select(self.kind(), states, &[self.local])?[0].epoch();
        let perfect = Measurement::inter_satellite_range(
            epoch,
            0.0,
            self.sigma_km,
            self.base_weight,
            self.local,
            self.remote,
        )?;
        noisy(perfect, states, rng)
    }
}
