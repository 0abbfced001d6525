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

//! Conversions between Cartesian states and orbital elements.
//!
//! The Cartesian to element direction is computed in hyperdual space so that the partials of the elements
//! with respect to the position and velocity come for free. All element sets are derived from the
//! non-singular equinoctial parameters. The element to Cartesian direction is only needed in real numbers.

use super::{AstroError, KeplerSolverSnafu, NotEllipticalSnafu, SingularElementsSnafu};
use crate::linalg::{Matrix6, Vector3, Vector6, U7};
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Float, OHyperdual};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

type Dual = OHyperdual<f64, U7>;

/// Maximum number of Newton iterations when solving Kepler's equation
const KEPLER_MAX_ITER: usize = 50;

/// Representation of the six orbital components of a raw state vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitType {
    /// x, y, z in km and vx, vy, vz in km/s
    Cartesian,
    /// sma (km), ecc, inc, raan, aop, anomaly (rad)
    Keplerian,
    /// sma (km), ex = e cos(aop), ey = e sin(aop), inc, raan, argument of latitude (rad)
    Circular,
    /// sma (km), ex = e cos(aop + raan), ey = e sin(aop + raan), hx = tan(i/2) cos(raan), hy = tan(i/2) sin(raan), longitude (rad)
    Equinoctial,
}

/// Which anomaly (or longitude, or argument of latitude) is stored in the sixth component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AngleType {
    Mean,
    Eccentric,
    True,
}

impl OrbitType {
    /// Names of the six orbital parameters for this orbit type and angle type.
    pub fn parameter_names(&self, angle: AngleType) -> [&'static str; 6] {
        match self {
            Self::Cartesian => ["x", "y", "z", "vx", "vy", "vz"],
            Self::Keplerian => [
                "sma",
                "ecc",
                "inc",
                "raan",
                "aop",
                match angle {
                    AngleType::Mean => "ma",
                    AngleType::Eccentric => "ea",
                    AngleType::True => "ta",
                },
            ],
            Self::Circular => [
                "sma",
                "ex",
                "ey",
                "inc",
                "raan",
                match angle {
                    AngleType::Mean => "alpha_m",
                    AngleType::Eccentric => "alpha_e",
                    AngleType::True => "alpha_v",
                },
            ],
            Self::Equinoctial => [
                "sma",
                "ex",
                "ey",
                "hx",
                "hy",
                match angle {
                    AngleType::Mean => "lm",
                    AngleType::Eccentric => "le",
                    AngleType::True => "lv",
                },
            ],
        }
    }
}

impl fmt::Display for OrbitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for AngleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Computes the elements of the Cartesian state `rv` in the requested representation, along with
/// their partials with respect to the Cartesian state (row i, column j is dE_i/dx_j).
pub fn elements_and_partials(
    rv: &Vector6<f64>,
    mu_km3_s2: f64,
    orbit_type: OrbitType,
    angle_type: AngleType,
) -> Result<(Vector6<f64>, Matrix6<f64>), AstroError> {
    if orbit_type == OrbitType::Cartesian {
        return Ok((*rv, Matrix6::identity()));
    }

    let state: Vector6<Dual> = hyperspace_from_vector(rv);
    let equinoctial = equinoctial_dual(&state, mu_km3_s2, angle_type)?;

    let elements = match orbit_type {
        OrbitType::Equinoctial => equinoctial,
        OrbitType::Keplerian => keplerian_from_equinoctial(&equinoctial),
        OrbitType::Circular => circular_from_equinoctial(&equinoctial),
        OrbitType::Cartesian => unreachable!(),
    };

    let mut values = Vector6::zeros();
    let mut partials = Matrix6::zeros();
    for i in 0..6 {
        values[i] = elements[i].real();
        for j in 1..7 {
            partials[(i, j - 1)] = elements[i][j];
        }
    }

    Ok((values, partials))
}

/// Converts the provided elements into a Cartesian state.
pub fn elements_to_cartesian(
    elements: &Vector6<f64>,
    mu_km3_s2: f64,
    orbit_type: OrbitType,
    angle_type: AngleType,
) -> Result<Vector6<f64>, AstroError> {
    let eq = match orbit_type {
        OrbitType::Cartesian => return Ok(*elements),
        OrbitType::Equinoctial => *elements,
        OrbitType::Keplerian => {
            let (sma, ecc, inc, raan, aop, anomaly) = (
                elements[0],
                elements[1],
                elements[2],
                elements[3],
                elements[4],
                elements[5],
            );
            ensure!(
                (0.0..1.0).contains(&ecc),
                NotEllipticalSnafu {
                    action: "converting Keplerian elements",
                    ecc,
                    sma_km: sma
                }
            );
            let pa = aop + raan;
            let t = (0.5 * inc).tan();
            Vector6::new(
                sma,
                ecc * pa.cos(),
                ecc * pa.sin(),
                t * raan.cos(),
                t * raan.sin(),
                anomaly + pa,
            )
        }
        OrbitType::Circular => {
            let (sma, ex, ey, inc, raan, alpha) = (
                elements[0],
                elements[1],
                elements[2],
                elements[3],
                elements[4],
                elements[5],
            );
            let (s_raan, c_raan) = raan.sin_cos();
            let t = (0.5 * inc).tan();
            Vector6::new(
                sma,
                ex * c_raan - ey * s_raan,
                ex * s_raan + ey * c_raan,
                t * c_raan,
                t * s_raan,
                alpha + raan,
            )
        }
    };

    equinoctial_to_cartesian(&eq, mu_km3_s2, angle_type)
}

/// Converts a true longitude into an eccentric longitude, real valued.
pub fn true_to_eccentric_longitude(lv: f64, ex: f64, ey: f64) -> f64 {
    let epsilon = (1.0 - ex * ex - ey * ey).sqrt();
    let (s_lv, c_lv) = lv.sin_cos();
    let num = ey * c_lv - ex * s_lv;
    let den = epsilon + 1.0 + ex * c_lv + ey * s_lv;
    lv + 2.0 * (num / den).atan()
}

/// Converts an eccentric longitude into a true longitude, real valued.
pub fn eccentric_to_true_longitude(le: f64, ex: f64, ey: f64) -> f64 {
    let epsilon = (1.0 - ex * ex - ey * ey).sqrt();
    let (s_le, c_le) = le.sin_cos();
    let num = ex * s_le - ey * c_le;
    let den = epsilon + 1.0 - ex * c_le - ey * s_le;
    le + 2.0 * (num / den).atan()
}

/// Converts an eccentric longitude into a mean longitude, real valued.
pub fn eccentric_to_mean_longitude(le: f64, ex: f64, ey: f64) -> f64 {
    le - ex * le.sin() + ey * le.cos()
}

/// Solves the generalized Kepler equation for the eccentric longitude using Newton iterations.
pub fn mean_to_eccentric_longitude(lm: f64, ex: f64, ey: f64) -> Result<f64, AstroError> {
    let mut le = lm;
    for _ in 0..KEPLER_MAX_ITER {
        let (s_le, c_le) = le.sin_cos();
        let f = le - ex * s_le + ey * c_le - lm;
        let f_prime = 1.0 - ex * c_le - ey * s_le;
        let delta = f / f_prime;
        le -= delta;
        if delta.abs() <= 1e-15 * le.abs().max(1.0) {
            return Ok(le);
        }
    }
    KeplerSolverSnafu {
        mean_longitude_rad: lm,
        iterations: KEPLER_MAX_ITER,
    }
    .fail()
}

fn equinoctial_to_cartesian(
    eq: &Vector6<f64>,
    mu_km3_s2: f64,
    angle_type: AngleType,
) -> Result<Vector6<f64>, AstroError> {
    let (sma, ex, ey, hx, hy, l) = (eq[0], eq[1], eq[2], eq[3], eq[4], eq[5]);
    let e2 = ex * ex + ey * ey;
    ensure!(
        sma > 0.0 && e2 < 1.0,
        NotEllipticalSnafu {
            action: "converting equinoctial elements",
            ecc: e2.sqrt(),
            sma_km: sma
        }
    );

    let le = match angle_type {
        AngleType::Eccentric => l,
        AngleType::True => true_to_eccentric_longitude(l, ex, ey),
        AngleType::Mean => mean_to_eccentric_longitude(l, ex, ey)?,
    };

    // Equinoctial reference frame
    let hx2 = hx * hx;
    let hy2 = hy * hy;
    let hh = 1.0 + hx2 + hy2;
    let f = Vector3::new((1.0 + hx2 - hy2) / hh, 2.0 * hx * hy / hh, -2.0 * hy / hh);
    let g = Vector3::new(2.0 * hx * hy / hh, (1.0 - hx2 + hy2) / hh, 2.0 * hx / hh);

    let beta = 1.0 / (1.0 + (1.0 - e2).sqrt());
    let (s_le, c_le) = le.sin_cos();
    let ex_c_ey_s = ex * c_le + ey * s_le;

    let x = sma * ((1.0 - beta * ey * ey) * c_le + beta * ex * ey * s_le - ex);
    let y = sma * ((1.0 - beta * ex * ex) * s_le + beta * ex * ey * c_le - ey);

    let factor = (mu_km3_s2 / sma).sqrt() / (1.0 - ex_c_ey_s);
    let x_dot = factor * (-s_le + beta * ey * ex_c_ey_s);
    let y_dot = factor * (c_le - beta * ex * ex_c_ey_s);

    let r = x * f + y * g;
    let v = x_dot * f + y_dot * g;

    Ok(Vector6::new(r[0], r[1], r[2], v[0], v[1], v[2]))
}

/// Equinoctial parameters of the hyperdual Cartesian state.
fn equinoctial_dual(
    state: &Vector6<Dual>,
    mu_km3_s2: f64,
    angle_type: AngleType,
) -> Result<Vector6<Dual>, AstroError> {
    let one = Dual::from_real(1.0);
    let two = Dual::from_real(2.0);
    let mu = Dual::from_real(mu_km3_s2);

    let r = Vector3::new(state[0], state[1], state[2]);
    let v = Vector3::new(state[3], state[4], state[5]);
    let rmag = norm(&r);
    let v2 = v.dot(&v);
    let r_dot_v = r.dot(&v);

    let inv_sma = two / rmag - v2 / mu;
    ensure!(
        inv_sma.real() > 0.0,
        NotEllipticalSnafu {
            action: "computing orbital elements",
            ecc: f64::NAN,
            sma_km: 1.0 / inv_sma.real()
        }
    );
    let sma = one / inv_sma;

    let hvec = r.cross(&v);
    let hmag = norm(&hvec);
    let wx = hvec[0] / hmag;
    let wy = hvec[1] / hmag;
    let wz = hvec[2] / hmag;
    ensure!(
        wz.real() > -1.0 + 1e-12,
        SingularElementsSnafu {
            action: "equinoctial elements are singular for retrograde equatorial orbits"
        }
    );
    let hx = -wy / (one + wz);
    let hy = wx / (one + wz);

    let hh = one + hx * hx + hy * hy;
    let f = Vector3::new(
        (one + hx * hx - hy * hy) / hh,
        two * hx * hy / hh,
        -two * hy / hh,
    );
    let g = Vector3::new(
        two * hx * hy / hh,
        (one - hx * hx + hy * hy) / hh,
        two * hx / hh,
    );

    // Eccentricity vector, split per component
    let ecoeff = v2 - mu / rmag;
    let evec = Vector3::new(
        (ecoeff * r[0] - r_dot_v * v[0]) / mu,
        (ecoeff * r[1] - r_dot_v * v[1]) / mu,
        (ecoeff * r[2] - r_dot_v * v[2]) / mu,
    );
    let ex = evec.dot(&f);
    let ey = evec.dot(&g);

    let lv = r.dot(&g).atan2(r.dot(&f));

    let l = match angle_type {
        AngleType::True => lv,
        AngleType::Eccentric => true_to_eccentric_longitude_dual(lv, ex, ey),
        AngleType::Mean => {
            let le = true_to_eccentric_longitude_dual(lv, ex, ey);
            le - ex * le.sin() + ey * le.cos()
        }
    };

    Ok(Vector6::new(sma, ex, ey, hx, hy, l))
}

fn true_to_eccentric_longitude_dual(lv: Dual, ex: Dual, ey: Dual) -> Dual {
    let one = Dual::from_real(1.0);
    let epsilon = (one - ex * ex - ey * ey).sqrt();
    let num = ey * lv.cos() - ex * lv.sin();
    let den = epsilon + one + ex * lv.cos() + ey * lv.sin();
    lv + Dual::from_real(2.0) * (num / den).atan()
}

fn keplerian_from_equinoctial(eq: &Vector6<Dual>) -> Vector6<Dual> {
    let (ex, ey, hx, hy, l) = (eq[1], eq[2], eq[3], eq[4], eq[5]);
    let ecc = (ex * ex + ey * ey).sqrt();
    let pa = ey.atan2(ex);
    let raan = hy.atan2(hx);
    let inc = Dual::from_real(2.0) * (hx * hx + hy * hy).sqrt().atan();
    Vector6::new(eq[0], ecc, inc, raan, pa - raan, l - pa)
}

fn circular_from_equinoctial(eq: &Vector6<Dual>) -> Vector6<Dual> {
    let (ex, ey, hx, hy, l) = (eq[1], eq[2], eq[3], eq[4], eq[5]);
    let raan = hy.atan2(hx);
    let inc = Dual::from_real(2.0) * (hx * hx + hy * hy).sqrt().atan();
    let (s_raan, c_raan) = (raan.sin(), raan.cos());
    Vector6::new(
        eq[0],
        ex * c_raan + ey * s_raan,
        ey * c_raan - ex * s_raan,
        inc,
        raan,
        l - raan,
    )
}

/// Returns the Cartesian partials of the Cartesian state with respect to the elements, i.e. the inverse of the
/// partials returned by [`elements_and_partials`].
pub fn cartesian_partials(
    rv: &Vector6<f64>,
    mu_km3_s2: f64,
    orbit_type: OrbitType,
    angle_type: AngleType,
) -> Result<Matrix6<f64>, AstroError> {
    let (_, de_dx) = elements_and_partials(rv, mu_km3_s2, orbit_type, angle_type)?;
    de_dx.try_inverse().ok_or(AstroError::SingularElements {
        action: "inverting the element partials",
    })
}
