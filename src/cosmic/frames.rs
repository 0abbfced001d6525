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

use super::{j2000_epoch, AstroError, MissingFrameDataSnafu};
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use snafu::OptionExt;
use std::f64::consts::TAU;
use std::fmt;

/// NAIF ID of the Sun
pub const SUN: i32 = 10;
/// NAIF ID of the Earth
pub const EARTH: i32 = 399;
/// NAIF ID of the Moon
pub const MOON: i32 = 301;
/// Orientation ID of the J2000 inertial frame
pub const J2000: i32 = 1;

/// Earth rotation rate in rad/s (IERS conventions)
pub const EARTH_ANGULAR_VELOCITY_RAD_S: f64 = 7.292_115_146_706_979e-5;

/// A tri-axial ellipsoid shape, limited to oblate bodies (polar radius smaller than the equatorial radius).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub equatorial_radius_km: f64,
    pub polar_radius_km: f64,
}

impl Ellipsoid {
    pub fn from_flattening(equatorial_radius_km: f64, flattening: f64) -> Self {
        Self {
            equatorial_radius_km,
            polar_radius_km: equatorial_radius_km * (1.0 - flattening),
        }
    }

    pub fn flattening(&self) -> f64 {
        (self.equatorial_radius_km - self.polar_radius_km) / self.equatorial_radius_km
    }

    pub fn mean_radius_km(&self) -> f64 {
        (2.0 * self.equatorial_radius_km + self.polar_radius_km) / 3.0
    }
}

/// A uniform rotation of the body fixed frame about the Z axis of the inertial frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyRotation {
    /// Rotation angle of the prime meridian at the J2000 reference epoch, in degrees
    pub angle_at_j2000_deg: f64,
    pub rate_rad_s: f64,
}

impl BodyRotation {
    /// Rotation angle of the prime meridian, in radians within [0, 2 pi)
    pub fn angle_rad(&self, epoch: Epoch) -> f64 {
        let dt_s = (epoch - j2000_epoch()).to_seconds();
        (self.angle_at_j2000_deg.to_radians() + self.rate_rad_s * dt_s).rem_euclid(TAU)
    }

    /// Rotation matrix from the body fixed frame to the inertial frame
    pub fn dcm_to_inertial(&self, epoch: Epoch) -> Matrix3<f64> {
        let (s, c) = self.angle_rad(epoch).sin_cos();
        Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.rate_rad_s)
    }
}

/// A frame is defined by the body at its center and its orientation.
///
/// The gravitational parameter, the shape and the rotation of the central body are optional, but the
/// propagation layer requires the gravitational parameter.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub ephemeris_id: i32,
    pub orientation_id: i32,
    /// Gravitational parameter of the central body in km^3/s^2
    pub mu_km3_s2: Option<f64>,
    pub shape: Option<Ellipsoid>,
    pub rotation: Option<BodyRotation>,
}

impl Frame {
    /// Initializes a frame without any physical data.
    pub const fn new(ephemeris_id: i32, orientation_id: i32) -> Self {
        Self {
            ephemeris_id,
            orientation_id,
            mu_km3_s2: None,
            shape: None,
            rotation: None,
        }
    }

    pub const fn with_mu_km3_s2(mut self, mu_km3_s2: f64) -> Self {
        self.mu_km3_s2 = Some(mu_km3_s2);
        self
    }

    pub const fn with_shape(mut self, shape: Ellipsoid) -> Self {
        self.shape = Some(shape);
        self
    }

    pub const fn with_rotation(mut self, rotation: BodyRotation) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn mu_km3_s2(&self) -> Result<f64, AstroError> {
        self.mu_km3_s2.context(MissingFrameDataSnafu {
            action: "retrieving gravitational parameter",
            data: "mu_km3_s2",
            frame: *self,
        })
    }

    pub fn shape(&self) -> Result<Ellipsoid, AstroError> {
        self.shape.context(MissingFrameDataSnafu {
            action: "retrieving shape",
            data: "shape",
            frame: *self,
        })
    }

    pub fn rotation(&self) -> Result<BodyRotation, AstroError> {
        self.rotation.context(MissingFrameDataSnafu {
            action: "retrieving rotation",
            data: "rotation",
            frame: *self,
        })
    }

    pub fn mean_equatorial_radius_km(&self) -> Result<f64, AstroError> {
        Ok(self.shape()?.equatorial_radius_km)
    }

    /// Returns true if both frames share the same center and orientation, regardless of their physical data.
    pub fn ephem_orient_matches(&self, other: Self) -> bool {
        self.ephemeris_id == other.ephemeris_id && self.orientation_id == other.orientation_id
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.ephemeris_id {
            SUN => "Sun".to_string(),
            EARTH => "Earth".to_string(),
            MOON => "Moon".to_string(),
            id => format!("body {id}"),
        };
        let orientation = match self.orientation_id {
            J2000 => "J2000".to_string(),
            id => format!("orientation {id}"),
        };
        write!(f, "{body} {orientation}")?;
        if let Some(mu) = self.mu_km3_s2 {
            write!(f, " (μ = {mu} km^3/s^2)")?;
        }
        Ok(())
    }
}

/// Earth centered inertial frame, with the WGS84 shape and the IERS rotation rate.
pub const EARTH_J2000: Frame = Frame {
    ephemeris_id: EARTH,
    orientation_id: J2000,
    mu_km3_s2: Some(398_600.435_436_096),
    shape: Some(Ellipsoid {
        equatorial_radius_km: 6378.1366,
        polar_radius_km: 6356.7519,
    }),
    rotation: Some(BodyRotation {
        angle_at_j2000_deg: 280.460_618_37,
        rate_rad_s: EARTH_ANGULAR_VELOCITY_RAD_S,
    }),
};

/// Sun centered inertial frame.
pub const SUN_J2000: Frame = Frame {
    ephemeris_id: SUN,
    orientation_id: J2000,
    mu_km3_s2: Some(132_712_440_041.939_38),
    shape: Some(Ellipsoid {
        equatorial_radius_km: 696_000.0,
        polar_radius_km: 696_000.0,
    }),
    rotation: None,
};

/// Moon centered inertial frame.
pub const MOON_J2000: Frame = Frame {
    ephemeris_id: MOON,
    orientation_id: J2000,
    mu_km3_s2: Some(4_902.800_066),
    shape: Some(Ellipsoid {
        equatorial_radius_km: 1737.4,
        polar_radius_km: 1737.4,
    }),
    rotation: None,
};
