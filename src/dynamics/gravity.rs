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
use crate::linalg::{Matrix3, Vector3, U4};
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Float, OHyperdual};
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

/// Unnormalized J2 of the Earth (EGM2008)
pub const EARTH_J2: f64 = 1.082_626_683_553_15e-3;

/// Oblateness perturbation of the central body, using the mu and the equatorial radius of the orbit's frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct J2 {
    pub j2: f64,
}

impl J2 {
    pub fn new(j2: f64) -> Arc<Self> {
        Arc::new(Self { j2 })
    }

    pub fn earth() -> Arc<Self> {
        Self::new(EARTH_J2)
    }

    fn body_data(&self, osc: &Orbit) -> Result<(f64, f64), DynamicsError> {
        Ok((
            osc.frame.mu_km3_s2().context(DynamicsAstroSnafu)?,
            osc.frame
                .mean_equatorial_radius_km()
                .context(DynamicsAstroSnafu)?,
        ))
    }
}

impl fmt::Display for J2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J2 = {:e}", self.j2)
    }
}

impl AccelModel for J2 {
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        let (mu_km3_s2, radius_km) = self.body_data(osc)?;
        let r = osc.radius_km;
        let rmag = r.norm();
        let z2_r2 = (r[2] / rmag).powi(2);
        let factor = -1.5 * self.j2 * mu_km3_s2 * radius_km.powi(2) / rmag.powi(5);
        Ok(Vector3::new(
            factor * r[0] * (1.0 - 5.0 * z2_r2),
            factor * r[1] * (1.0 - 5.0 * z2_r2),
            factor * r[2] * (3.0 - 5.0 * z2_r2),
        ))
    }

    fn dual_eom(&self, osc: &Orbit) -> Result<(Vector3<f64>, Matrix3<f64>), DynamicsError> {
        let (mu_km3_s2, radius_km) = self.body_data(osc)?;
        let r: Vector3<OHyperdual<f64, U4>> = hyperspace_from_vector(&osc.radius_km);
        let rmag = norm(&r);
        let one = OHyperdual::<f64, U4>::from_real(1.0);
        let three = OHyperdual::<f64, U4>::from_real(3.0);
        let five = OHyperdual::<f64, U4>::from_real(5.0);
        let z2_r2 = (r[2] / rmag).powi(2);
        let factor = OHyperdual::<f64, U4>::from_real(
            -1.5 * self.j2 * mu_km3_s2 * radius_km.powi(2),
        ) / rmag.powi(5);

        let acc = Vector3::new(
            factor * r[0] * (one - five * z2_r2),
            factor * r[1] * (one - five * z2_r2),
            factor * r[2] * (three - five * z2_r2),
        );

        let mut fx = Vector3::zeros();
        let mut grad = Matrix3::zeros();
        for i in 0..3 {
            fx[i] = acc[i].real();
            for j in 1..4 {
                grad[(i, j - 1)] = acc[i][j];
            }
        }
        Ok((fx, grad))
    }
}
