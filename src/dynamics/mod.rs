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

use crate::cosmic::{AstroError, Orbit, SpacecraftState};
use crate::linalg::{DMatrix, Matrix3, Matrix3x6, Matrix6, Vector3, Vector6};
use crate::md::ParameterDriver;
use snafu::Snafu;
use std::fmt;
use std::sync::Arc;

/// Cartesian-based orbital dynamics.
///
/// The central body gravity is always included and read from the frame of the orbit.
pub mod orbital;
pub use self::orbital::*;

/// Spacecraft dynamics, combining the orbital dynamics, the force models and the additional equations.
pub mod spacecraft;
pub use self::spacecraft::*;

/// Atmospheric drag models.
pub mod drag;
pub use self::drag::*;

/// Zonal harmonics of the central body.
pub mod gravity;
pub use self::gravity::*;

/// Time derivatives of a spacecraft state, as returned by the equations of motion.
#[derive(Clone, Debug, PartialEq)]
pub struct StateRates {
    /// Velocity and acceleration, in km/s and km/s^2
    pub pos_vel: Vector6<f64>,
    /// Mass flow rate, in kg/s
    pub mass_rate: f64,
    /// Rates of the additional parameters, in the order of the additional equations
    pub additional: Vec<f64>,
}

/// A trait for models with equations of motion that can be integrated.
///
/// The partials returned by `dual_eom` are used to propagate the Jacobian of the state with respect to the
/// initial conditions and to the named sensitivity parameters.
pub trait Dynamics: Send + Sync {
    /// Defines the equations of motion at the provided state.
    fn eom(&self, state: &SpacecraftState) -> Result<StateRates, DynamicsError>;

    /// Defines the equations of motion and their partials: the 6x6 partials of the Cartesian rates with respect
    /// to the Cartesian state, and the 6 x n partials of those rates with respect to each named parameter.
    fn dual_eom(
        &self,
        state: &SpacecraftState,
        parameters: &[String],
    ) -> Result<(StateRates, Matrix6<f64>, DMatrix<f64>), DynamicsError>;

    /// Number of additional parameters integrated alongside the orbit
    fn additional_dimension(&self) -> usize {
        0
    }

    /// Drivers of the parameters of these dynamics, all unselected by default
    fn parameter_drivers(&self) -> Vec<ParameterDriver> {
        Vec::new()
    }
}

/// A trait for immutable dynamics that return a force, and which depend on the spacecraft (e.g. drag).
///
/// The returned value is already divided by the mass of the spacecraft, i.e. it is an acceleration in km/s^2.
pub trait ForceModel: Send + Sync + fmt::Display {
    /// Defines the equations of motion for this force model.
    fn eom(&self, state: &SpacecraftState) -> Result<Vector3<f64>, DynamicsError>;

    /// Defines the acceleration and its partial derivatives with respect to position and velocity.
    fn dual_eom(
        &self,
        state: &SpacecraftState,
    ) -> Result<(Vector3<f64>, Matrix3x6<f64>), DynamicsError>;

    /// Drivers of the parameters of this force model
    fn parameter_drivers(&self) -> Vec<ParameterDriver> {
        Vec::new()
    }

    /// Partial of the acceleration with respect to the named parameter, or None if that parameter is not a
    /// parameter of this model.
    fn parameter_partial(
        &self,
        _state: &SpacecraftState,
        _name: &str,
    ) -> Result<Option<Vector3<f64>>, DynamicsError> {
        Ok(None)
    }

    /// Returns a copy of this model using the values of the drivers whose name matches one of its parameters.
    fn configured(&self, drivers: &[ParameterDriver]) -> Arc<dyn ForceModel>;
}

/// A trait for immutable dynamics that return an acceleration and only depend on the orbit (e.g. J2).
pub trait AccelModel: Send + Sync + fmt::Display {
    /// Defines the equations of motion for this acceleration model.
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError>;

    /// Defines the acceleration and its partial derivatives with respect to position.
    fn dual_eom(&self, osc: &Orbit) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError>;
}

/// Equations for additional parameters integrated alongside the orbit, e.g. an accumulated quantity.
pub trait AdditionalEquations: Send + Sync + fmt::Display {
    fn name(&self) -> &str;

    /// Number of values these equations integrate
    fn dimension(&self) -> usize;

    /// Returns the derivatives of this model's own values, which are provided in `values`.
    fn derivatives(
        &self,
        state: &SpacecraftState,
        values: &[f64],
    ) -> Result<Vec<f64>, DynamicsError>;
}

/// Dynamical model errors.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// Astrodynamics error.
    #[snafu(display("dynamical model encountered an astro error: {source}"))]
    DynamicsAstro { source: AstroError },
    #[snafu(display("no force model provides the parameter `{name}`"))]
    UnknownParameter { name: String },
    #[snafu(display("{model} requires {what}"))]
    InvalidModelInput { model: String, what: String },
    #[snafu(display("additional equations {name} expect {expected} values, state has {got}"))]
    AdditionalDimension {
        name: String,
        expected: usize,
        got: usize,
    },
}
