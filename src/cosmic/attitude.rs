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

use super::Orbit;
use crate::linalg::{Matrix3, Vector3};
use na::{Rotation3, UnitQuaternion};
use std::fmt;

/// Orientation of the spacecraft body frame with respect to the inertial frame of its orbit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Attitude {
    /// Rotation from the inertial frame to the body frame
    pub orientation: UnitQuaternion<f64>,
    /// Angular velocity of the body frame, expressed in the inertial frame, in rad/s
    pub angular_velocity_rad_s: Vector3<f64>,
}

impl Attitude {
    pub fn identity() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            angular_velocity_rad_s: Vector3::zeros(),
        }
    }

    /// Rotates an inertial vector into the body frame
    pub fn to_body(&self, inertial: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.transform_vector(inertial)
    }

    /// Rotates a body frame vector into the inertial frame
    pub fn to_inertial(&self, body: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse_transform_vector(body)
    }
}

impl Default for Attitude {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for Attitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.orientation.euler_angles();
        write!(
            f,
            "attitude (roll, pitch, yaw) = ({:.3}, {:.3}, {:.3}) deg",
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees()
        )
    }
}

/// An attitude provider computes the attitude of the spacecraft from its orbit.
///
/// It is consulted every time a state is decoded from the integrator.
pub trait AttitudeProvider: fmt::Debug + Send + Sync {
    fn attitude(&self, orbit: &Orbit) -> Attitude;
}

/// Fixed orientation with respect to the inertial frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InertialAttitude {
    pub orientation: UnitQuaternion<f64>,
}

impl InertialAttitude {
    pub fn new(orientation: UnitQuaternion<f64>) -> Self {
        Self { orientation }
    }
}

impl Default for InertialAttitude {
    fn default() -> Self {
        Self::new(UnitQuaternion::identity())
    }
}

impl AttitudeProvider for InertialAttitude {
    fn attitude(&self, _orbit: &Orbit) -> Attitude {
        Attitude {
            orientation: self.orientation,
            angular_velocity_rad_s: Vector3::zeros(),
        }
    }
}

/// Local vertical, local horizontal attitude: X along the position vector, Z along the orbital momentum and
/// Y completing the right handed frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LvlhAttitude;

impl LvlhAttitude {
    /// Rotation matrix from the inertial frame to the LVLH frame of this orbit
    pub fn dcm_from_inertial(orbit: &Orbit) -> Matrix3<f64> {
        let x_hat = orbit.radius_km.normalize();
        let z_hat = orbit.hvec().normalize();
        let y_hat = z_hat.cross(&x_hat);
        Matrix3::from_rows(&[x_hat.transpose(), y_hat.transpose(), z_hat.transpose()])
    }
}

impl AttitudeProvider for LvlhAttitude {
    fn attitude(&self, orbit: &Orbit) -> Attitude {
        let dcm = Self::dcm_from_inertial(orbit);
        let rate = orbit.hvec() / orbit.rmag_km().powi(2);
        Attitude {
            orientation: UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
                dcm,
            )),
            angular_velocity_rad_s: rate,
        }
    }
}
