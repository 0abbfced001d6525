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

use super::{DynamicsAstroSnafu, DynamicsError, ForceModel, InvalidModelInputSnafu};
use crate::cosmic::SpacecraftState;
use crate::linalg::{Matrix3x6, Vector3, Vector6, U7};
use crate::md::ParameterDriver;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Float, OHyperdual};
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::sync::Arc;

/// Name of the drag coefficient parameter
pub const DRAG_COEFFICIENT: &str = "Cd";

/// Exponential atmosphere: rho = rho0 * exp(-(h - h0) / H), where h is the height above the equatorial radius of
/// the central body.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExponentialAtmosphere {
    /// Density at the reference height, in kg/m^3
    pub rho0_kg_m3: f64,
    pub ref_alt_km: f64,
    pub scale_height_km: f64,
}

impl ExponentialAtmosphere {
    /// Density in kg/m^3 at the provided height above the body radius
    pub fn density(&self, height_km: f64) -> f64 {
        self.rho0_kg_m3 * (-(height_km - self.ref_alt_km) / self.scale_height_km).exp()
    }

    /// Exponential model of the Earth's atmosphere from Vallado (table 8-4), anchored at 400 km.
    pub fn earth_400km() -> Self {
        Self {
            rho0_kg_m3: 3.725e-12,
            ref_alt_km: 400.0,
            scale_height_km: 58.515,
        }
    }
}

/// Atmospheric drag with a constant drag coefficient, using the drag area and the mass of the spacecraft.
///
/// The atmosphere co-rotates with the central body if its frame has a rotation model.
#[derive(Clone, Debug, PartialEq)]
pub struct Drag {
    pub atmosphere: ExponentialAtmosphere,
    /// Drag coefficient (no unit)
    pub cd: f64,
    /// Driver of the drag coefficient, its value is used by `configured`
    pub cd_driver: ParameterDriver,
}

impl Drag {
    pub fn new(atmosphere: ExponentialAtmosphere, cd: f64) -> Result<Arc<Self>, DynamicsError> {
        Ok(Arc::new(Self::new_raw(atmosphere, cd)?))
    }

    pub fn new_raw(atmosphere: ExponentialAtmosphere, cd: f64) -> Result<Self, DynamicsError> {
        let cd_driver = ParameterDriver::new(DRAG_COEFFICIENT, cd, 0.01, 0.0, 10.0).map_err(|e| {
            DynamicsError::InvalidModelInput {
                model: "drag".to_string(),
                what: e.to_string(),
            }
        })?;
        Ok(Self {
            atmosphere,
            cd,
            cd_driver,
        })
    }

    /// Returns the constant factor of the acceleration, in 1/km
    fn ballistic_factor(&self, state: &SpacecraftState) -> Result<f64, DynamicsError> {
        ensure!(
            state.mass_kg > 0.0,
            InvalidModelInputSnafu {
                model: "drag".to_string(),
                what: format!("a strictly positive mass, got {} kg", state.mass_kg)
            }
        );
        // rho is in kg/m^3 and the area in m^2: the 1e3 factor converts 1/m to 1/km
        Ok(-0.5 * self.cd * (state.drag_area_m2 / state.mass_kg) * 1e3)
    }

    fn angular_velocity(state: &SpacecraftState) -> Vector3<f64> {
        state
            .orbit
            .frame
            .rotation
            .map(|rot| rot.angular_velocity())
            .unwrap_or_else(Vector3::zeros)
    }
}

impl fmt::Display for Drag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Drag (Cd = {}, rho0 = {:e} kg/m^3 at {} km, H = {} km)",
            self.cd,
            self.atmosphere.rho0_kg_m3,
            self.atmosphere.ref_alt_km,
            self.atmosphere.scale_height_km
        )
    }
}

impl ForceModel for Drag {
    fn eom(&self, state: &SpacecraftState) -> Result<Vector3<f64>, DynamicsError> {
        let osc = &state.orbit;
        let body_radius_km = osc
            .frame
            .mean_equatorial_radius_km()
            .context(DynamicsAstroSnafu)?;
        let omega = Self::angular_velocity(state);
        let velocity = osc.velocity_km_s - omega.cross(&osc.radius_km);
        let rho = self.atmosphere.density(osc.rmag_km() - body_radius_km);
        Ok(self.ballistic_factor(state)? * rho * velocity.norm() * velocity)
    }

    fn dual_eom(
        &self,
        state: &SpacecraftState,
    ) -> Result<(Vector3<f64>, Matrix3x6<f64>), DynamicsError> {
        let osc = &state.orbit;
        let body_radius_km = osc
            .frame
            .mean_equatorial_radius_km()
            .context(DynamicsAstroSnafu)?;
        let omega = Self::angular_velocity(state);

        let pos_vel: Vector6<OHyperdual<f64, U7>> =
            hyperspace_from_vector(&osc.to_cartesian_pos_vel());
        let radius = Vector3::new(pos_vel[0], pos_vel[1], pos_vel[2]);
        let velocity = Vector3::new(pos_vel[3], pos_vel[4], pos_vel[5]);
        let omega_d: Vector3<OHyperdual<f64, U7>> = Vector3::new(
            OHyperdual::from_real(omega[0]),
            OHyperdual::from_real(omega[1]),
            OHyperdual::from_real(omega[2]),
        );

        let rel_velocity = velocity - omega_d.cross(&radius);
        let height = norm(&radius) - OHyperdual::from_real(body_radius_km + self.atmosphere.ref_alt_km);
        let rho = OHyperdual::from_real(self.atmosphere.rho0_kg_m3)
            * (-height / OHyperdual::from_real(self.atmosphere.scale_height_km)).exp();
        let factor = OHyperdual::from_real(self.ballistic_factor(state)?) * rho * norm(&rel_velocity);

        let mut fx = Vector3::zeros();
        let mut grad = Matrix3x6::zeros();
        for i in 0..3 {
            let acc_i = factor * rel_velocity[i];
            fx[i] = acc_i.real();
            for j in 1..7 {
                grad[(i, j - 1)] = acc_i[j];
            }
        }

        Ok((fx, grad))
    }

    fn parameter_drivers(&self) -> Vec<ParameterDriver> {
        vec![self.cd_driver.clone()]
    }

    fn parameter_partial(
        &self,
        state: &SpacecraftState,
        name: &str,
    ) -> Result<Option<Vector3<f64>>, DynamicsError> {
        if name != DRAG_COEFFICIENT {
            return Ok(None);
        }
        // The acceleration is linear in Cd
        Ok(Some(self.eom(state)? / self.cd))
    }

    fn configured(&self, drivers: &[ParameterDriver]) -> Arc<dyn ForceModel> {
        let mut me = self.clone();
        if let Some(driver) = drivers.iter().find(|d| d.name == DRAG_COEFFICIENT) {
            me.cd = driver.value();
            me.cd_driver = driver.clone();
        }
        Arc::new(me)
    }
}

#[cfg(test)]
mod ut_drag {
    use super::*;
    use crate::cosmic::{Orbit, EARTH_J2000};
    use crate::time::{Epoch, TimeScale};

    fn leo_state() -> SpacecraftState {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        let orbit =
            Orbit::keplerian(6778.0, 0.001, 51.6, 10.0, 20.0, 30.0, epoch, EARTH_J2000).unwrap();
        SpacecraftState::new(orbit, 500.0).with_drag_area(10.0)
    }

    #[test]
    fn drag_partials() {
        let drag = Drag::new(ExponentialAtmosphere::earth_400km(), 2.2).unwrap();
        let state = leo_state();
        let acc = drag.eom(&state).unwrap();
        // Drag opposes the motion
        assert!(acc.dot(&state.orbit.velocity_km_s) < 0.0);
        let (fx, grad) = drag.dual_eom(&state).unwrap();
        assert!((acc - fx).norm() < 1e-20);

        for j in 0..6 {
            let h = if j < 3 { 1e-2 } else { 1e-5 };
            let mut plus = state.clone();
            let mut minus = state.clone();
            if j < 3 {
                plus.orbit.radius_km[j] += h;
                minus.orbit.radius_km[j] -= h;
            } else {
                plus.orbit.velocity_km_s[j - 3] += h;
                minus.orbit.velocity_km_s[j - 3] -= h;
            }
            let fd = (drag.eom(&plus).unwrap() - drag.eom(&minus).unwrap()) / (2.0 * h);
            for i in 0..3 {
                assert!(
                    (fd[i] - grad[(i, j)]).abs() < 1e-6 * grad[(i, j)].abs().max(1e-12),
                    "da{i}/dx{j}: {} vs {}",
                    fd[i],
                    grad[(i, j)]
                );
            }
        }

        let cd_partial = drag
            .parameter_partial(&state, DRAG_COEFFICIENT)
            .unwrap()
            .unwrap();
        assert!((cd_partial * 2.2 - acc).norm() < 1e-20);
        assert!(drag.parameter_partial(&state, "Cr").unwrap().is_none());
    }

    #[test]
    fn configured_cd() {
        let drag = Drag::new(ExponentialAtmosphere::earth_400km(), 2.2).unwrap();
        let mut drivers = drag.parameter_drivers();
        drivers[0].set_value(1.1);
        let half = drag.configured(&drivers);
        let state = leo_state();
        let ratio = half.eom(&state).unwrap().norm() / drag.eom(&state).unwrap().norm();
        assert!((ratio - 0.5).abs() < 1e-12);
    }
}
