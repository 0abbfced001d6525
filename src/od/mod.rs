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

/// Provides the measurement models: position-velocity, range, range rate and inter-satellite range.
pub mod msr;
pub use msr::{
    range_bias_name, EstimatedMeasurement, Measurement, MeasurementError, MeasurementModel,
    MeasurementType,
};

/// Provides a ground station on a rotating body, with its visibility.
mod ground_station;
pub use ground_station::GroundStation;

mod params;
pub use params::{ArcDrivers, EstimationParameterSet};

mod builder;
pub use builder::PropagatorBuilder;

/// Provides the simulation of measurements from propagated arcs
pub mod simulator;

/// Provides the batch least squares estimator
pub mod blse;
pub use blse::{
    BLSDiagnostics, BLSError, BLSSettings, BLSSolution, BLSSolver, BatchLeastSquares,
    ResidualRecord,
};

pub mod prelude {
    pub use super::blse::*;
    pub use super::simulator::*;
    pub use super::*;

    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}
