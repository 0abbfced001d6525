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

use super::{Attitude, Orbit};
use crate::linalg::{DMatrix, Vector3};
use crate::time::Epoch;
use std::fmt;

/// A spacecraft state, composed of its orbit, its attitude, its mass (in kg), its drag area, and any additional
/// parameters integrated alongside the orbit.
///
/// Optionally, the state also stores the Jacobian of its Cartesian state with respect to the initial orbital
/// elements and the sensitivity parameters of the propagation it comes from.
#[derive(Clone, Debug, PartialEq)]
pub struct SpacecraftState {
    pub orbit: Orbit,
    pub attitude: Attitude,
    pub mass_kg: f64,
    /// Cross section used by atmospheric drag, in m^2
    pub drag_area_m2: f64,
    pub additional: Vec<f64>,
    /// Partials of the Cartesian state with respect to the initial elements and the sensitivity parameters,
    /// a 6 x (6 + number of parameters) matrix
    pub jacobian: Option<DMatrix<f64>>,
}

impl SpacecraftState {
    /// Initialize a spacecraft state from its orbit and mass, with an identity attitude and no drag area
    pub fn new(orbit: Orbit, mass_kg: f64) -> Self {
        Self {
            orbit,
            attitude: Attitude::identity(),
            mass_kg,
            drag_area_m2: 0.0,
            additional: Vec::new(),
            jacobian: None,
        }
    }

    pub fn with_orbit(mut self, orbit: Orbit) -> Self {
        self.orbit = orbit;
        self
    }

    pub fn with_attitude(mut self, attitude: Attitude) -> Self {
        self.attitude = attitude;
        self
    }

    pub fn with_mass(mut self, mass_kg: f64) -> Self {
        self.mass_kg = mass_kg;
        self
    }

    pub fn with_drag_area(mut self, drag_area_m2: f64) -> Self {
        self.drag_area_m2 = drag_area_m2;
        self
    }

    pub fn with_additional(mut self, additional: Vec<f64>) -> Self {
        self.additional = additional;
        self
    }

    pub fn with_jacobian(mut self, jacobian: DMatrix<f64>) -> Self {
        self.jacobian = Some(jacobian);
        self
    }

    /// Returns a copy of this state where the provided delta-v (in km/s) has been applied instantaneously
    pub fn with_dv_km_s(mut self, dv_km_s: Vector3<f64>) -> Self {
        self.orbit = self.orbit.with_dv_km_s(dv_km_s);
        self
    }

    pub fn epoch(&self) -> Epoch {
        self.orbit.epoch
    }

    /// Returns the root sum squared error between this state and the other, in kilometers for the position and
    /// kilometers per second in velocity, and kilograms in mass.
    pub fn rss(&self, other: &Self) -> (f64, f64, f64) {
        let (rss_p, rss_v) = crate::utils::rss_orbit_errors(&self.orbit, &other.orbit);
        (rss_p, rss_v, (self.mass_kg - other.mass_kg).abs())
    }
}

impl fmt::Display for SpacecraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mass_prec = f.precision().unwrap_or(3);
        let orbit_prec = f.precision().unwrap_or(6);
        write!(
            f,
            "mass = {:.mass_prec$} kg @  {:.orbit_prec$}",
            self.mass_kg, self.orbit
        )?;
        if !self.additional.is_empty() {
            write!(f, "  additional = {:?}", self.additional)?;
        }
        Ok(())
    }
}
