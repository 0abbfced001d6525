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

use crate::cosmic::{AstroError, SpacecraftState};
use crate::linalg::{DMatrix, DVector};
use crate::md::ParameterDriver;
use crate::od::GroundStation;
use crate::propagators::PropagationError;
use crate::time::{Epoch, Unit};
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, Snafu};
use std::fmt;

mod interlink;
mod pv;
mod range;
mod rangerate;

pub use range::range_bias_name;

/// Kind of a measurement
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    /// Position (km) and velocity (km/s) of a spacecraft
    PV,
    /// Range from a ground station (km)
    Range,
    /// Range rate seen from a ground station (km/s)
    RangeRate,
    /// Range between two spacecraft (km)
    InterSatelliteRange,
}

impl MeasurementType {
    /// Number of components of this kind of measurement
    pub fn dimension(&self) -> usize {
        match self {
            Self::PV => 6,
            Self::Range | Self::RangeRate | Self::InterSatelliteRange => 1,
        }
    }

    /// Number of propagators involved in this kind of measurement
    pub fn propagator_count(&self) -> usize {
        match self {
            Self::InterSatelliteRange => 2,
            _ => 1,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::PV => "km, km/s",
            Self::Range | Self::InterSatelliteRange => "km",
            Self::RangeRate => "km/s",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PV => write!(f, "PV"),
            Self::Range => write!(f, "range"),
            Self::RangeRate => write!(f, "range rate"),
            Self::InterSatelliteRange => write!(f, "inter-satellite range"),
        }
    }
}

/// Errors raised when building, estimating or simulating measurements.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MeasurementError {
    #[snafu(display("invalid {kind} measurement: {msg}"))]
    InvalidMeasurement { kind: MeasurementType, msg: String },
    #[snafu(display("{kind} measurement @ {epoch} requires {expected} states, got {got}"))]
    MissingStates {
        kind: MeasurementType,
        epoch: Epoch,
        expected: usize,
        got: usize,
    },
    #[snafu(display("{kind} measurement @ {epoch} evaluated with a state @ {state_epoch}"))]
    EpochMismatch {
        kind: MeasurementType,
        epoch: Epoch,
        state_epoch: Epoch,
    },
    #[snafu(display("{kind} measurement could not be computed: {source}"))]
    MeasurementAstro {
        kind: MeasurementType,
        source: AstroError,
    },
    #[snafu(display("measurement simulation failed: {source}"))]
    SimulationPropagation { source: PropagationError },
}

/// The model of a measurement, with the data specific to its kind.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementModel {
    PV,
    Range {
        station: GroundStation,
        /// Bias added to the geometric range, which may be estimated
        bias: Option<ParameterDriver>,
    },
    RangeRate {
        station: GroundStation,
    },
    InterSatelliteRange,
}

impl MeasurementModel {
    pub fn kind(&self) -> MeasurementType {
        match self {
            Self::PV => MeasurementType::PV,
            Self::Range { .. } => MeasurementType::Range,
            Self::RangeRate { .. } => MeasurementType::RangeRate,
            Self::InterSatelliteRange => MeasurementType::InterSatelliteRange,
        }
    }
}

/// An observed measurement: its value, the theoretical standard deviation and base weight of each component,
/// and the indices of the propagators whose states it depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub epoch: Epoch,
    pub observed: DVector<f64>,
    pub sigma: DVector<f64>,
    pub base_weight: DVector<f64>,
    pub propagators: Vec<usize>,
    pub model: MeasurementModel,
}

/// The value of a measurement computed from the estimated states, with its partials.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatedMeasurement {
    pub epoch: Epoch,
    pub value: DVector<f64>,
    /// Partials of the value with respect to the Cartesian state of each propagator involved, in the order of the
    /// propagators of the measurement
    pub state_partials: Vec<DMatrix<f64>>,
    /// Partials of the value with respect to the parameters of the measurement, by name of the driver
    pub parameter_partials: Vec<(String, DVector<f64>)>,
}

impl Measurement {
    /// Builds a new measurement, checking the consistency of its dimensions.
    pub fn new(
        epoch: Epoch,
        observed: DVector<f64>,
        sigma: DVector<f64>,
        base_weight: DVector<f64>,
        propagators: Vec<usize>,
        model: MeasurementModel,
    ) -> Result<Self, MeasurementError> {
        let kind = model.kind();
        let dim = kind.dimension();
        ensure!(
            observed.len() == dim && sigma.len() == dim && base_weight.len() == dim,
            InvalidMeasurementSnafu {
                kind,
                msg: format!(
                    "expected {dim} components, got {} values, {} sigmas and {} weights",
                    observed.len(),
                    sigma.len(),
                    base_weight.len()
                )
            }
        );
        ensure!(
            sigma.iter().all(|s| s.is_finite() && *s > 0.0),
            InvalidMeasurementSnafu {
                kind,
                msg: format!("standard deviations must be strictly positive, got {sigma}")
            }
        );
        ensure!(
            base_weight.iter().all(|w| w.is_finite() && *w > 0.0),
            InvalidMeasurementSnafu {
                kind,
                msg: format!("base weights must be strictly positive, got {base_weight}")
            }
        );
        ensure!(
            propagators.len() == kind.propagator_count(),
            InvalidMeasurementSnafu {
                kind,
                msg: format!(
                    "requires {} propagator(s), got {}",
                    kind.propagator_count(),
                    propagators.len()
                )
            }
        );
        Ok(Self {
            epoch,
            observed,
            sigma,
            base_weight,
            propagators,
            model,
        })
    }

    pub fn kind(&self) -> MeasurementType {
        self.model.kind()
    }

    pub fn dimension(&self) -> usize {
        self.observed.len()
    }

    /// Weight of each component: the base weight divided by the variance
    pub fn weights(&self) -> DVector<f64> {
        self.base_weight.component_div(&self.sigma.component_mul(&self.sigma))
    }

    /// Drivers of the parameters specific to this measurement
    pub fn parameter_drivers(&self) -> Vec<ParameterDriver> {
        match &self.model {
            MeasurementModel::Range {
                bias: Some(bias), ..
            } => vec![bias.clone()],
            _ => Vec::new(),
        }
    }

    /// Computes the value of this measurement from the states of its propagators, provided in the order of
    /// `propagators`. The values of the measurement parameters are read from `drivers` when found by name.
    pub fn estimate(
        &self,
        states: &[&SpacecraftState],
        drivers: &[ParameterDriver],
    ) -> Result<EstimatedMeasurement, MeasurementError> {
        let kind = self.kind();
        ensure!(
            states.len() == self.propagators.len(),
            MissingStatesSnafu {
                kind,
                epoch: self.epoch,
                expected: self.propagators.len(),
                got: states.len()
            }
        );
        for state in states {
            ensure!(
                (state.epoch() - self.epoch).abs() <= 1 * Unit::Microsecond,
                EpochMismatchSnafu {
                    kind,
                    epoch: self.epoch,
                    state_epoch: state.epoch()
                }
            );
        }

        match &self.model {
            MeasurementModel::PV => Ok(pv::estimate(self.epoch, states[0])),
            MeasurementModel::Range { station, bias } => {
                let bias = bias.as_ref().map(|bias| {
                    let value = drivers
                        .iter()
                        .find(|d| d.name == bias.name)
                        .map_or(bias.value(), |d| d.value());
                    (bias.name.clone(), value)
                });
                range::estimate(self.epoch, station, states[0], bias)
            }
            MeasurementModel::RangeRate { station } => {
                rangerate::estimate(self.epoch, station, states[0])
            }
            MeasurementModel::InterSatelliteRange => {
                Ok(interlink::estimate(self.epoch, states[0], states[1]))
            }
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: ", self.kind(), self.epoch)?;
        for (i, value) in self.observed.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value:.6} (σ = {:e})", self.sigma[i])?;
        }
        write!(f, " {}", self.kind().unit())
    }
}

#[cfg(test)]
mod ut_msr {
    use super::*;
    use crate::cosmic::{Orbit, EARTH_J2000};
    use crate::time::TimeScale;

    fn state() -> SpacecraftState {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        let orbit = Orbit::keplerian(7000.0, 0.01, 30.0, 40.0, 50.0, 60.0, epoch, EARTH_J2000).unwrap();
        SpacecraftState::new(orbit, 100.0)
    }

    #[test]
    fn rejects_inconsistent_measurements() {
        let state = state();
        assert!(Measurement::new(
            state.epoch(),
            DVector::from_element(6, 1.0),
            DVector::from_element(6, 0.0),
            DVector::from_element(6, 1.0),
            vec![0],
            MeasurementModel::PV
        )
        .is_err());
        assert!(Measurement::new(
            state.epoch(),
            DVector::from_element(1, 1.0),
            DVector::from_element(1, 1.0),
            DVector::from_element(1, 1.0),
            vec![0],
            MeasurementModel::InterSatelliteRange
        )
        .is_err());
    }

    #[test]
    fn weights_and_epochs() {
        let state = state();
        let msr = Measurement::pv(
            state.epoch(),
            state.orbit.radius_km,
            state.orbit.velocity_km_s,
            1e-3,
            1e-6,
            2.0,
            0,
        )
        .unwrap();
        let w = msr.weights();
        assert!((w[0] - 2e6).abs() < 1e-6);
        assert!((w[5] - 2e12).abs() < 1e-0);

        let later = state
            .clone()
            .with_orbit(state.orbit.with_epoch(state.epoch() + 1 * Unit::Second));
        assert!(matches!(
            msr.estimate(&[&later], &[]),
            Err(MeasurementError::EpochMismatch { .. })
        ));
        assert!(matches!(
            msr.estimate(&[], &[]),
            Err(MeasurementError::MissingStates { .. })
        ));
    }
}
