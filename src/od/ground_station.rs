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

use crate::cosmic::{AstroError, FrameMismatchSnafu, Frame, Orbit, EARTH_J2000};
use crate::io::ConfigRepr;
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use typed_builder::TypedBuilder;

/// A ground station, fixed on the surface of the rotating central body.
///
/// The frame must carry the shape and the rotation model of the body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct GroundStation {
    #[builder(setter(into))]
    pub name: String,
    /// Geodetic latitude, in degrees
    pub latitude_deg: f64,
    /// in degrees
    pub longitude_deg: f64,
    /// Height above the ellipsoid, in km
    #[builder(default)]
    #[serde(default)]
    pub height_km: f64,
    /// Minimum elevation for the spacecraft to be visible, in degrees
    #[builder(default)]
    #[serde(default)]
    pub elevation_mask_deg: f64,
    #[builder(default = EARTH_J2000)]
    #[serde(default = "default_frame")]
    pub frame: Frame,
}

fn default_frame() -> Frame {
    EARTH_J2000
}

impl GroundStation {
    /// Initializes a point on the surface of a celestial object, without any elevation mask.
    pub fn from_point(
        name: &str,
        latitude_deg: f64,
        longitude_deg: f64,
        height_km: f64,
        frame: Frame,
    ) -> Self {
        Self {
            name: name.to_string(),
            latitude_deg,
            longitude_deg,
            height_km,
            elevation_mask_deg: 0.0,
            frame,
        }
    }

    pub fn with_elevation_mask(mut self, elevation_mask_deg: f64) -> Self {
        self.elevation_mask_deg = elevation_mask_deg;
        self
    }

    /// Position of the station in the body fixed frame, in km
    pub fn body_fixed_position_km(&self) -> Result<Vector3<f64>, AstroError> {
        let shape = self.frame.shape()?;
        let f = shape.flattening();
        let e2 = f * (2.0 - f);
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_long, cos_long) = self.longitude_deg.to_radians().sin_cos();
        // Radius of curvature in the prime vertical
        let n = shape.equatorial_radius_km / (1.0 - e2 * sin_lat.powi(2)).sqrt();
        Ok(Vector3::new(
            (n + self.height_km) * cos_lat * cos_long,
            (n + self.height_km) * cos_lat * sin_long,
            (n * (1.0 - e2) + self.height_km) * sin_lat,
        ))
    }

    /// Rotation from the topocentric South-East-Zenith frame to the body fixed frame
    fn sez_to_body_fixed(&self) -> Matrix3<f64> {
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_long, cos_long) = self.longitude_deg.to_radians().sin_cos();
        Matrix3::new(
            sin_lat * cos_long,
            -sin_long,
            cos_lat * cos_long,
            sin_lat * sin_long,
            cos_long,
            cos_lat * sin_long,
            -cos_lat,
            0.0,
            sin_lat,
        )
    }

    /// Returns this ground station as an orbit in the inertial frame, i.e. its inertial position and velocity
    pub fn to_orbit(&self, epoch: Epoch) -> Result<Orbit, AstroError> {
        let rotation = self.frame.rotation()?;
        let radius_km = rotation.dcm_to_inertial(epoch) * self.body_fixed_position_km()?;
        let velocity_km_s = rotation.angular_velocity().cross(&radius_km);
        Ok(Orbit::from_position_velocity(
            radius_km,
            velocity_km_s,
            epoch,
            self.frame,
        ))
    }

    /// Computes the azimuth (deg), elevation (deg) and range (km) of the provided spacecraft seen from this station.
    pub fn azimuth_elevation_range(&self, rx: &Orbit) -> Result<(f64, f64, f64), AstroError> {
        ensure!(
            rx.frame.ephem_orient_matches(self.frame),
            FrameMismatchSnafu {
                action: "computing azimuth and elevation",
                frame1: rx.frame,
                frame2: self.frame
            }
        );
        let tx = self.to_orbit(rx.epoch)?;
        let rho_inertial = rx.radius_km - tx.radius_km;
        let range_km = rho_inertial.norm();
        let dcm = self.frame.rotation()?.dcm_to_inertial(rx.epoch) * self.sez_to_body_fixed();
        let rho_sez = dcm.transpose() * rho_inertial;

        let elevation_deg = (rho_sez.z / range_km).asin().to_degrees();
        let azimuth_deg = rho_sez.y.atan2(-rho_sez.x).to_degrees().rem_euclid(360.0);
        Ok((azimuth_deg, elevation_deg, range_km))
    }

    /// Elevation of the provided spacecraft above the local horizontal plane, in degrees.
    pub fn elevation_deg(&self, rx: &Orbit) -> Result<f64, AstroError> {
        Ok(self.azimuth_elevation_range(rx)?.1)
    }

    /// Returns true if the spacecraft is above the elevation mask of this station.
    pub fn is_visible(&self, rx: &Orbit) -> Result<bool, AstroError> {
        Ok(self.elevation_deg(rx)? >= self.elevation_mask_deg)
    }
}

impl ConfigRepr for GroundStation {}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (lat.: {:.4} deg    long.: {:.4} deg    alt.: {:.3} m) [{}]",
            self.name,
            self.latitude_deg,
            self.longitude_deg,
            self.height_km * 1e3,
            self.frame,
        )
    }
}
