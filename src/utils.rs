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

use crate::cosmic::Orbit;
use crate::linalg::{Matrix3, Vector3};
use std::f64::consts::{PI, TAU};

/// Returns the tilde matrix from the provided Vector3, such that `tilde_matrix(a) * b = a x b`.
pub fn tilde_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v[2], v[1], v[2], 0.0, -v[0], -v[1], v[0], 0.0)
}

/// Returns the provided angle bounded between 0.0 and 360.0
pub fn between_0_360(angle_deg: f64) -> f64 {
    angle_deg.rem_euclid(360.0)
}

/// Returns the provided angle bounded between -180.0 and +180.0
pub fn between_pm_180(angle_deg: f64) -> f64 {
    let bounded = between_0_360(angle_deg);
    if bounded > 180.0 {
        bounded - 360.0
    } else {
        bounded
    }
}

/// Returns the angle (in radians) shifted by a multiple of 2 pi to be within pi of the reference angle.
pub fn normalize_angle(angle_rad: f64, reference_rad: f64) -> f64 {
    angle_rad - TAU * ((angle_rad + PI - reference_rad) / TAU).floor()
}

/// Returns the root sum squared (RSS) position and velocity errors between two orbits, in km and km/s.
pub fn rss_orbit_errors(prop_err: &Orbit, cur_state: &Orbit) -> (f64, f64) {
    (
        (prop_err.radius_km - cur_state.radius_km).norm(),
        (prop_err.velocity_km_s - cur_state.velocity_km_s).norm(),
    )
}
