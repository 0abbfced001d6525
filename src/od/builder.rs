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

use super::params::ArcDrivers;
use crate::cosmic::{AngleType, OrbitType, SpacecraftState};
use crate::dynamics::{Dynamics, SpacecraftDynamics};
use crate::errors::{ConfigAstroSnafu, ConfigError, InvalidConfigSnafu};
use crate::linalg::Vector6;
use crate::md::events::EventDetector;
use crate::md::ParameterDriver;
use crate::propagators::{ErrorCtrl, PropOpts, Propagator, RK};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::sync::Arc;

/// Builds the propagator of one arc of an estimation from the current values of its drivers.
///
/// The orbital drivers are the six elements of the initial orbit in the orbit type of the builder, which is also
/// the orbit type used by the integrator. Their scales are derived from the position scale.
#[derive(Clone)]
pub struct PropagatorBuilder<E: ErrorCtrl> {
    /// Propagator from which the built propagators are copied, with its integrator and options
    prototype: Propagator<SpacecraftDynamics, E>,
    /// Reference state of the arc, whose orbit provides the reference values of the orbital drivers
    pub initial_state: SpacecraftState,
    /// Order of magnitude of the expected position corrections, in km
    pub position_scale_km: f64,
    /// Parameters of the dynamics which are estimated
    estimated_parameters: Vec<String>,
}

impl<E: ErrorCtrl> PropagatorBuilder<E> {
    pub fn new<T: RK>(
        initial_state: SpacecraftState,
        dynamics: SpacecraftDynamics,
        opts: PropOpts<E>,
        orbit_type: OrbitType,
        angle_type: AngleType,
        position_scale_km: f64,
    ) -> Result<Self, ConfigError> {
        ensure!(
            position_scale_km.is_finite() && position_scale_km > 0.0,
            InvalidConfigSnafu {
                msg: format!("position scale must be strictly positive, got {position_scale_km}")
            }
        );
        // Check that the initial orbit can be expressed in these elements
        initial_state
            .orbit
            .to_elements(orbit_type, angle_type)
            .context(ConfigAstroSnafu)?;

        Ok(Self {
            prototype: Propagator::new::<T>(dynamics, opts).with_orbit_type(orbit_type, angle_type),
            initial_state,
            position_scale_km,
            estimated_parameters: Vec::new(),
        })
    }

    /// Marks the parameter of the dynamics with this name as estimated
    pub fn with_estimated_parameter(mut self, name: &str) -> Result<Self, ConfigError> {
        ensure!(
            self.prototype
                .dynamics
                .parameter_drivers()
                .iter()
                .any(|d| d.name == name),
            InvalidConfigSnafu {
                msg: format!("dynamics have no parameter named `{name}`")
            }
        );
        if !self.estimated_parameters.iter().any(|p| p == name) {
            self.estimated_parameters.push(name.to_string());
        }
        Ok(self)
    }

    /// Registers a detector on the propagators of this arc, e.g. a maneuver at a known epoch
    pub fn with_event_detector(mut self, detector: Arc<dyn EventDetector>) -> Self {
        self.prototype.add_event_detector(detector);
        self
    }

    pub fn orbit_type(&self) -> OrbitType {
        self.prototype.orbit_type
    }

    pub fn angle_type(&self) -> AngleType {
        self.prototype.angle_type
    }

    /// Scale of each element, from the effect of a position error of `position_scale_km` and of the matching
    /// velocity error on that element.
    fn element_scales(&self, partials: &crate::linalg::Matrix6<f64>) -> Result<Vector6<f64>, ConfigError> {
        let orbit = &self.initial_state.orbit;
        let mu_km3_s2 = orbit.frame.mu_km3_s2().context(ConfigAstroSnafu)?;
        let dp = self.position_scale_km;
        let dv = mu_km3_s2 * dp / (orbit.vmag_km_s() * orbit.rmag_km().powi(2));

        let mut scales = Vector6::zeros();
        for i in 0..6 {
            let mut scale = 0.0;
            for j in 0..3 {
                scale += partials[(i, j)].abs() * dp + partials[(i, j + 3)].abs() * dv;
            }
            scales[i] = if scale.is_finite() && scale > 0.0 {
                scale
            } else {
                dp
            };
        }
        Ok(scales)
    }

    /// Drivers of the initial orbit, all estimated
    pub fn orbital_drivers(&self) -> Result<Vec<ParameterDriver>, ConfigError> {
        let (elements, partials) = self
            .initial_state
            .orbit
            .element_partials(self.orbit_type(), self.angle_type())
            .context(ConfigAstroSnafu)?;
        let scales = self.element_scales(&partials)?;
        let names = self.orbit_type().parameter_names(self.angle_type());

        let mut drivers = Vec::with_capacity(6);
        for i in 0..6 {
            drivers.push(ParameterDriver::unbounded(names[i], elements[i], scales[i])?.estimated());
        }
        Ok(drivers)
    }

    /// Drivers of the dynamics, flagged as estimated if selected
    pub fn propagation_drivers(&self) -> Vec<ParameterDriver> {
        self.prototype
            .dynamics
            .parameter_drivers()
            .into_iter()
            .map(|d| {
                let estimated = self.estimated_parameters.contains(&d.name);
                d.with_estimated(estimated)
            })
            .collect()
    }

    /// All the drivers of this arc, at their reference values
    pub fn arc_drivers(&self) -> Result<ArcDrivers, ConfigError> {
        Ok(ArcDrivers {
            orbital: self.orbital_drivers()?,
            propagation: self.propagation_drivers(),
        })
    }

    /// Builds the propagator and the initial state of this arc from the current values of the drivers.
    ///
    /// The propagator computes the Jacobian with respect to the initial elements and the estimated parameters.
    pub fn build(
        &self,
        drivers: &ArcDrivers,
    ) -> Result<(Propagator<SpacecraftDynamics, E>, SpacecraftState), ConfigError> {
        ensure!(
            drivers.orbital.len() == 6,
            InvalidConfigSnafu {
                msg: format!("expected 6 orbital drivers, got {}", drivers.orbital.len())
            }
        );
        let elements = Vector6::from_iterator(drivers.orbital.iter().map(|d| d.value()));
        let orbit = crate::cosmic::Orbit::from_elements(
            &elements,
            self.orbit_type(),
            self.angle_type(),
            self.initial_state.epoch(),
            self.initial_state.orbit.frame,
        )
        .context(ConfigAstroSnafu)?;

        let mut state = self.initial_state.clone().with_orbit(orbit);
        state.jacobian = None;

        let mut prop = self.prototype.clone();
        prop.dynamics = self.prototype.dynamics.configured(&drivers.propagation);
        let sensitivity = drivers
            .propagation
            .iter()
            .filter(|d| d.estimated)
            .map(|d| d.name.clone())
            .collect();
        Ok((prop.with_sensitivity(sensitivity), state))
    }
}

impl<E: ErrorCtrl> fmt::Display for PropagatorBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "builder of {} from {} (position scale {} km)",
            self.prototype, self.initial_state.orbit, self.position_scale_km
        )
    }
}
