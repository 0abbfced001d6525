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

use super::{
    elements_and_partials, elements_to_cartesian, AngleType, AstroError, Frame, OrbitType,
};
use crate::linalg::{Matrix6, Vector3, Vector6};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::between_0_360;
use std::f64::consts::TAU;
use std::fmt;

/// An orbit is the Cartesian position and velocity of an object at a given epoch, expressed in a frame.
///
/// The orbital elements are computed on request, and require the frame to have a gravitational parameter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Orbit {
    pub radius_km: Vector3<f64>,
    pub velocity_km_s: Vector3<f64>,
    pub epoch: Epoch,
    pub frame: Frame,
}

impl Orbit {
    /// Creates a new Orbit from its Cartesian components.
    #[allow(clippy::too_many_arguments)]
    pub fn cartesian(
        x_km: f64,
        y_km: f64,
        z_km: f64,
        vx_km_s: f64,
        vy_km_s: f64,
        vz_km_s: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self {
            radius_km: Vector3::new(x_km, y_km, z_km),
            velocity_km_s: Vector3::new(vx_km_s, vy_km_s, vz_km_s),
            epoch,
            frame,
        }
    }

    pub fn from_position_velocity(
        radius_km: Vector3<f64>,
        velocity_km_s: Vector3<f64>,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self {
            radius_km,
            velocity_km_s,
            epoch,
            frame,
        }
    }

    /// Creates a new Orbit from the position and velocity stacked in a single vector.
    pub fn from_cartesian_pos_vel(pos_vel: &Vector6<f64>, epoch: Epoch, frame: Frame) -> Self {
        Self::cartesian(
            pos_vel[0], pos_vel[1], pos_vel[2], pos_vel[3], pos_vel[4], pos_vel[5], epoch, frame,
        )
    }

    /// Creates a new Orbit from its Keplerian elements, angles in degrees.
    ///
    /// The orbit must be elliptical.
    #[allow(clippy::too_many_arguments)]
    pub fn keplerian(
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ta_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        Self::from_elements(
            &Vector6::new(
                sma_km,
                ecc,
                inc_deg.to_radians(),
                raan_deg.to_radians(),
                aop_deg.to_radians(),
                ta_deg.to_radians(),
            ),
            OrbitType::Keplerian,
            AngleType::True,
            epoch,
            frame,
        )
    }

    /// Creates a new Orbit from its circular elements: the eccentricity vector is expressed from the ascending node,
    /// and `alpha_v_deg` is the true argument of latitude.
    #[allow(clippy::too_many_arguments)]
    pub fn circular(
        sma_km: f64,
        ex: f64,
        ey: f64,
        inc_deg: f64,
        raan_deg: f64,
        alpha_v_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        Self::from_elements(
            &Vector6::new(
                sma_km,
                ex,
                ey,
                inc_deg.to_radians(),
                raan_deg.to_radians(),
                alpha_v_deg.to_radians(),
            ),
            OrbitType::Circular,
            AngleType::True,
            epoch,
            frame,
        )
    }

    /// Creates a new Orbit from its equinoctial elements, where `lv_deg` is the true longitude.
    #[allow(clippy::too_many_arguments)]
    pub fn equinoctial(
        sma_km: f64,
        ex: f64,
        ey: f64,
        hx: f64,
        hy: f64,
        lv_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        Self::from_elements(
            &Vector6::new(sma_km, ex, ey, hx, hy, lv_deg.to_radians()),
            OrbitType::Equinoctial,
            AngleType::True,
            epoch,
            frame,
        )
    }

    /// Creates a new Orbit from a vector of elements (angles in radians) in the provided representation.
    pub fn from_elements(
        elements: &Vector6<f64>,
        orbit_type: OrbitType,
        angle_type: AngleType,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        let mu_km3_s2 = frame.mu_km3_s2()?;
        let pos_vel = elements_to_cartesian(elements, mu_km3_s2, orbit_type, angle_type)?;
        Ok(Self::from_cartesian_pos_vel(&pos_vel, epoch, frame))
    }

    /// Returns the elements of this orbit (angles in radians) in the provided representation.
    pub fn to_elements(
        &self,
        orbit_type: OrbitType,
        angle_type: AngleType,
    ) -> Result<Vector6<f64>, AstroError> {
        Ok(self.element_partials(orbit_type, angle_type)?.0)
    }

    /// Returns the elements of this orbit and their partial derivatives with respect to the Cartesian state.
    pub fn element_partials(
        &self,
        orbit_type: OrbitType,
        angle_type: AngleType,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), AstroError> {
        elements_and_partials(
            &self.to_cartesian_pos_vel(),
            self.frame.mu_km3_s2()?,
            orbit_type,
            angle_type,
        )
    }

    /// Returns the position and velocity stacked in a single vector.
    pub fn to_cartesian_pos_vel(&self) -> Vector6<f64> {
        Vector6::new(
            self.radius_km[0],
            self.radius_km[1],
            self.radius_km[2],
            self.velocity_km_s[0],
            self.velocity_km_s[1],
            self.velocity_km_s[2],
        )
    }

    /// Returns a copy of this orbit with the provided delta-v (in km/s) added to its velocity.
    pub fn with_dv_km_s(mut self, dv_km_s: Vector3<f64>) -> Self {
        self.velocity_km_s += dv_km_s;
        self
    }

    pub fn with_epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn rmag_km(&self) -> f64 {
        self.radius_km.norm()
    }

    pub fn vmag_km_s(&self) -> f64 {
        self.velocity_km_s.norm()
    }

    /// Returns the orbital momentum vector
    pub fn hvec(&self) -> Vector3<f64> {
        self.radius_km.cross(&self.velocity_km_s)
    }

    pub fn hmag(&self) -> f64 {
        self.hvec().norm()
    }

    /// Returns the specific mechanical energy in km^2/s^2
    pub fn energy_km2_s2(&self) -> Result<f64, AstroError> {
        Ok(self.vmag_km_s().powi(2) / 2.0 - self.frame.mu_km3_s2()? / self.rmag_km())
    }

    pub fn sma_km(&self) -> Result<f64, AstroError> {
        Ok(-self.frame.mu_km3_s2()? / (2.0 * self.energy_km2_s2()?))
    }

    /// Returns the eccentricity vector (no unit)
    pub fn evec(&self) -> Result<Vector3<f64>, AstroError> {
        let mu_km3_s2 = self.frame.mu_km3_s2()?;
        let r = self.radius_km;
        let v = self.velocity_km_s;
        Ok(((v.norm_squared() - mu_km3_s2 / r.norm()) * r - (r.dot(&v)) * v) / mu_km3_s2)
    }

    pub fn ecc(&self) -> Result<f64, AstroError> {
        Ok(self.evec()?.norm())
    }

    pub fn inc_deg(&self) -> f64 {
        let hvec = self.hvec();
        (hvec[2] / hvec.norm()).acos().to_degrees()
    }

    pub fn raan_deg(&self) -> Result<f64, AstroError> {
        self.keplerian_angle_deg(3, AngleType::True)
    }

    pub fn aop_deg(&self) -> Result<f64, AstroError> {
        self.keplerian_angle_deg(4, AngleType::True)
    }

    pub fn ta_deg(&self) -> Result<f64, AstroError> {
        self.keplerian_angle_deg(5, AngleType::True)
    }

    pub fn ea_deg(&self) -> Result<f64, AstroError> {
        self.keplerian_angle_deg(5, AngleType::Eccentric)
    }

    pub fn ma_deg(&self) -> Result<f64, AstroError> {
        self.keplerian_angle_deg(5, AngleType::Mean)
    }

    /// Returns the argument of latitude (aop + ta) in degrees
    pub fn aol_deg(&self) -> Result<f64, AstroError> {
        let kep = self.to_elements(OrbitType::Keplerian, AngleType::True)?;
        Ok(between_0_360((kep[4] + kep[5]).to_degrees()))
    }

    fn keplerian_angle_deg(&self, idx: usize, angle_type: AngleType) -> Result<f64, AstroError> {
        let kep = self.to_elements(OrbitType::Keplerian, angle_type)?;
        Ok(between_0_360(kep[idx].to_degrees()))
    }

    /// Returns the radius of periapsis in km
    pub fn periapsis_km(&self) -> Result<f64, AstroError> {
        Ok(self.sma_km()? * (1.0 - self.ecc()?))
    }

    /// Returns the radius of apoapsis in km
    pub fn apoapsis_km(&self) -> Result<f64, AstroError> {
        Ok(self.sma_km()? * (1.0 + self.ecc()?))
    }

    /// Returns the mean motion in rad/s
    pub fn mean_motion_rad_s(&self) -> Result<f64, AstroError> {
        let sma_km = self.sma_km()?;
        Ok((self.frame.mu_km3_s2()? / sma_km.powi(3)).sqrt())
    }

    pub fn period(&self) -> Result<Duration, AstroError> {
        Ok((TAU / self.mean_motion_rad_s()?) * Unit::Second)
    }

    /// Returns the height above the equatorial radius of the central body, in km
    pub fn height_km(&self) -> Result<f64, AstroError> {
        Ok(self.rmag_km() - self.frame.mean_equatorial_radius_km()?)
    }

    /// Returns whether both orbits are within the position and velocity tolerances of each other, at the same epoch and in the same frame.
    pub fn eq_within(&self, other: &Self, radial_tol_km: f64, velocity_tol_km_s: f64) -> bool {
        self.epoch == other.epoch
            && self.frame.ephem_orient_matches(other.frame)
            && (self.radius_km - other.radius_km).norm() <= radial_tol_km
            && (self.velocity_km_s - other.velocity_km_s).norm() <= velocity_tol_km_s
    }
}

impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimals = f.precision().unwrap_or(6);
        let r = self.radius_km;
        let v = self.velocity_km_s;
        write!(
            f,
            "[{}] {}\tposition = [{:.decimals$}, {:.decimals$}, {:.decimals$}] km\tvelocity = [{:.decimals$}, {:.decimals$}, {:.decimals$}] km/s",
            self.frame, self.epoch, r[0], r[1], r[2], v[0], v[1], v[2],
        )?;
        if let (Ok(sma), Ok(ecc), Ok(ta)) = (self.sma_km(), self.ecc(), self.ta_deg()) {
            write!(
                f,
                "\tsma = {sma:.decimals$} km\tecc = {ecc:.decimals$}\tinc = {:.decimals$} deg\tta = {ta:.decimals$} deg",
                self.inc_deg(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod ut_orbit {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use crate::cosmic::EARTH_J2000;
    use crate::time::TimeScale;

    #[test]
    fn keplerian_getters() {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        let orbit =
            Orbit::keplerian(8000.0, 0.1, 30.0, 40.0, 50.0, 60.0, epoch, EARTH_J2000).unwrap();
        assert_abs_diff_eq!(orbit.sma_km().unwrap(), 8000.0, epsilon = 1e-8);
        assert_abs_diff_eq!(orbit.ecc().unwrap(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(orbit.inc_deg(), 30.0, epsilon = 1e-10);
        assert_abs_diff_eq!(orbit.raan_deg().unwrap(), 40.0, epsilon = 1e-10);
        assert_abs_diff_eq!(orbit.aop_deg().unwrap(), 50.0, epsilon = 1e-10);
        assert_abs_diff_eq!(orbit.ta_deg().unwrap(), 60.0, epsilon = 1e-10);
        assert_abs_diff_eq!(orbit.aol_deg().unwrap(), 110.0, epsilon = 1e-10);
        // Eccentric and mean anomalies are ordered for the first half of the orbit
        assert!(orbit.ma_deg().unwrap() < orbit.ea_deg().unwrap());
        assert!(orbit.ea_deg().unwrap() < orbit.ta_deg().unwrap());
        assert_abs_diff_eq!(orbit.periapsis_km().unwrap(), 7200.0, epsilon = 1e-8);
        assert_abs_diff_eq!(orbit.apoapsis_km().unwrap(), 8800.0, epsilon = 1e-8);
        let period = orbit.period().unwrap().to_seconds();
        assert_relative_eq!(
            period,
            TAU * (8000.0_f64.powi(3) / 398_600.435_436_096).sqrt(),
            max_relative = 1e-10
        );
    }

    #[test]
    fn constructors_agree() {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        let kep = Orbit::keplerian(7500.0, 0.01, 51.6, 10.0, 20.0, 30.0, epoch, EARTH_J2000).unwrap();
        let circ = kep.to_elements(OrbitType::Circular, AngleType::True).unwrap();
        let from_circ = Orbit::circular(
            circ[0],
            circ[1],
            circ[2],
            circ[3].to_degrees(),
            circ[4].to_degrees(),
            circ[5].to_degrees(),
            epoch,
            EARTH_J2000,
        )
        .unwrap();
        assert!(kep.eq_within(&from_circ, 1e-8, 1e-11));

        let eq = kep.to_elements(OrbitType::Equinoctial, AngleType::True).unwrap();
        let from_eq = Orbit::equinoctial(
            eq[0],
            eq[1],
            eq[2],
            eq[3],
            eq[4],
            eq[5].to_degrees(),
            epoch,
            EARTH_J2000,
        )
        .unwrap();
        assert!(kep.eq_within(&from_eq, 1e-8, 1e-11));
    }

    #[test]
    fn invalid_elements() {
        let epoch = Epoch::from_gregorian_at_midnight(2020, 1, 1, TimeScale::UTC);
        assert!(Orbit::keplerian(7000.0, 1.2, 0.0, 0.0, 0.0, 0.0, epoch, EARTH_J2000).is_err());
        assert!(
            Orbit::keplerian(7000.0, 0.1, 0.0, 0.0, 0.0, 0.0, epoch, Frame::new(399, 1)).is_err()
        );
    }
}
