/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2021 Christopher Rabotin <christopher.rabotin@gmail.com>

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

/*! # nyx-od

Event-aware numerical orbit propagation and batch least squares orbit determination.

The propagation engine integrates a raw state vector encoded by a [`propagators::StateMapper`] in any
orbit type, pauses on the sign changes of registered [`md::events::EventDetector`]s, and reacts to them
(continue, stop, reset the state, reset the derivatives). The estimator in [`od::blse`] rebuilds those
propagators from a snapshot of its free parameters at every evaluation and refines them with a
Gauss-Newton or Levenberg-Marquardt normal-equations solver.
*/

/// Provides the propagator, its integrators, the state mapper and the integration loop.
pub mod propagators;

/// Provides the force and acceleration models, and the orbital dynamics combining them.
pub mod dynamics;

/// Provides the frames, orbits, element conversions, attitude and spacecraft states.
pub mod cosmic;

/// Utility functions shared by different modules.
pub mod utils;

mod errors;
pub use self::errors::{ConfigError, EventError};

/// Configuration loading from YAML.
pub mod io;

/// Orbit determination: measurements, builders, parameter drivers and the batch least squares estimator.
pub mod od;

/// Mission design tools: event detectors, handlers and parameter drivers.
pub mod md;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

pub use self::cosmic::{Frame, Orbit, SpacecraftState};

/// The prelude, which exports the most commonly used structures.
pub mod prelude {
    pub use crate::cosmic::{
        AngleType, Attitude, AttitudeProvider, Frame, InertialAttitude, LvlhAttitude, Orbit,
        OrbitType, SpacecraftState, EARTH_J2000, MOON_J2000, SUN_J2000,
    };
    pub use crate::dynamics::{
        AccelModel, Drag, Dynamics, ExponentialAtmosphere, ForceModel, OrbitalDynamics,
        SpacecraftDynamics, DRAG_COEFFICIENT, J2,
    };
    pub use crate::md::events::*;
    pub use crate::md::ParameterDriver;
    pub use crate::od::prelude::*;
    pub use crate::propagators::*;
    pub use crate::time::{Duration, Epoch, TimeSeries, TimeUnits, Unit};
}
