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

use super::{AccelModel, DynamicsAstroSnafu, DynamicsError};
use crate::cosmic::Orbit;
use crate::linalg::{Matrix6, Vector3, Vector6, U7};
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Float, OHyperdual};
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

/// `OrbitalDynamics` provides the equations of motion of the central body gravity and of any acceleration model.
#[derive(Clone)]
pub struct OrbitalDynamics {
    pub accel_models: Vec<Arc<dyn AccelModel>>,
}

impl OrbitalDynamics {
    /// Initializes a OrbitalDynamics which only simulates the gravity pull of the central body.
    pub fn two_body() -> Self {
        Self::new(vec![])
    }

    /// Initialize orbital dynamics with a list of acceleration models
    pub fn new(accel_models: Vec<Arc<dyn AccelModel>>) -> Self {
        Self { accel_models }
    }

    /// Initialize new orbital mechanics with the provided model.
    /// **Note:** Orbital dynamics _always_ include two body dynamics, these cannot be turned off.
    pub fn from_model(accel_model: Arc<dyn AccelModel>) -> Self {
        Self::new(vec![accel_model])
    }

    /// Add a model to the currently defined orbital dynamics
    pub fn add_model(&mut self, accel_model: Arc<dyn AccelModel>) {
        self.accel_models.push(accel_model);
    }

    /// Returns the velocity and the total acceleration
    pub fn eom(&self, osc: &Orbit) -> Result<Vector6<f64>, DynamicsError> {
        let mu_km3_s2 = osc.frame.mu_km3_s2().context(DynamicsAstroSnafu)?;
        let body_acceleration = (-mu_km3_s2 / osc.rmag_km().powi(3)) * osc.radius_km;

        let mut d_x = Vector6::from_iterator(
            osc.velocity_km_s
                .iter()
                .chain(body_acceleration.iter())
                .cloned(),
        );

        // Apply the acceleration models
        for model in &self.accel_models {
            let model_acc = model.eom(osc)?;
            for i in 0..3 {
                d_x[i + 3] += model_acc[i];
            }
        }

        Ok(d_x)
    }

    /// Returns the velocity and the total acceleration, and their partials with respect to the Cartesian state
    pub fn dual_eom(&self, osc: &Orbit) -> Result<(Vector6<f64>, Matrix6<f64>), DynamicsError> {
        let mu_km3_s2 = osc.frame.mu_km3_s2().context(DynamicsAstroSnafu)?;

        // Extract data from hyperspace
        let state: Vector6<OHyperdual<f64, U7>> =
            hyperspace_from_vector(&osc.to_cartesian_pos_vel());
        let radius = Vector3::new(state[0], state[1], state[2]);
        let velocity = Vector3::new(state[3], state[4], state[5]);

        // Code up math as usual
        let rmag = norm(&radius);
        let body_acceleration =
            radius * (OHyperdual::<f64, U7>::from_real(-mu_km3_s2) / rmag.powi(3));

        // Extract result into Vector6 and Matrix6
        let mut fx = Vector6::zeros();
        let mut grad = Matrix6::zeros();
        for i in 0..6 {
            fx[i] = if i < 3 {
                velocity[i].real()
            } else {
                body_acceleration[i - 3].real()
            };
            for j in 1..7 {
                grad[(i, j - 1)] = if i < 3 {
                    velocity[i][j]
                } else {
                    body_acceleration[i - 3][j]
                };
            }
        }

        // Apply the acceleration models
        for model in &self.accel_models {
            let (model_acc, model_grad) = model.dual_eom(osc)?;
            for i in 0..3 {
                fx[i + 3] += model_acc[i];
                for j in 0..3 {
                    grad[(i + 3, j)] += model_grad[(i, j)];
                }
            }
        }

        Ok((fx, grad))
    }
}

impl fmt::Display for OrbitalDynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.accel_models.iter().map(|x| format!("{x}")).collect();
        write!(f, "Orbital dynamics: central body gravity")?;
        if !names.is_empty() {
            write!(f, "; {}", names.join("; "))?;
        }
        Ok(())
    }
}
