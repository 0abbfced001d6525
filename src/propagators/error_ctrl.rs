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

use super::StateLayout;
use crate::linalg::{DVector, Vector3};
use std::fmt;

// This determines when to take into consideration the magnitude of the state_delta and
// prevents dividing by too small of a number.
const REL_ERR_THRESH: f64 = 0.1;

/// The Error Control trait manages how a propagator computes the error in the current step.
///
/// Only six components at a time are considered: the orbital components of the raw state vector, and each
/// column of the Jacobian block through [`jacobian_error`]. The mass and the additional parameters never drive
/// the step size.
pub trait ErrorCtrl: Copy + Send + Sync + fmt::Debug {
    /// Computes the actual error of the current step.
    ///
    /// The `error_est` is the estimated error computed from the difference in the two stages of
    /// of the RK propagator. The `candidate` variable is the candidate state, and `cur_state` is
    /// the current state. This function must return the error.
    fn estimate(error_est: &DVector<f64>, candidate: &DVector<f64>, cur_state: &DVector<f64>)
        -> f64;
}

fn slice3(v: &DVector<f64>, start: usize) -> Vector3<f64> {
    Vector3::new(v[start], v[start + 1], v[start + 2])
}

/// A largest error control which effectively computes the largest relative error of the orbital components
///
/// (Source)[https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/forcemodel/ODEModel.cpp#L3033]
#[derive(Clone, Copy, Debug, Default)]
pub struct LargestError;

impl ErrorCtrl for LargestError {
    fn estimate(
        error_est: &DVector<f64>,
        candidate: &DVector<f64>,
        cur_state: &DVector<f64>,
    ) -> f64 {
        let mut max_err = 0.0;
        for i in 0..6 {
            let delta = (candidate[i] - cur_state[i]).abs();
            let err = if delta > REL_ERR_THRESH {
                (error_est[i] / delta).abs()
            } else {
                error_est[i].abs()
            };
            if err > max_err {
                max_err = err;
            }
        }
        max_err
    }
}

/// An RSS step error control which computes the L2 norm of the error of the first and second triplets of
/// orbital components (e.g. the position and the velocity), relative to the change over the step.
///
/// (Source)[https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/forcemodel/ODEModel.cpp#L3045]
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianStep;

impl ErrorCtrl for RSSCartesianStep {
    fn estimate(
        error_est: &DVector<f64>,
        candidate: &DVector<f64>,
        cur_state: &DVector<f64>,
    ) -> f64 {
        let err_radius = rss_step(
            &slice3(error_est, 0),
            &slice3(candidate, 0),
            &slice3(cur_state, 0),
        );
        let err_velocity = rss_step(
            &slice3(error_est, 3),
            &slice3(candidate, 3),
            &slice3(cur_state, 3),
        );
        err_radius.max(err_velocity)
    }
}

/// An RSS state error control, which is more stringent than [`RSSCartesianStep`] as the error is relative to
/// the magnitude of the state itself.
///
/// (Source)[https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/forcemodel/ODEModel.cpp#L3004]
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianState;

impl ErrorCtrl for RSSCartesianState {
    fn estimate(
        error_est: &DVector<f64>,
        candidate: &DVector<f64>,
        cur_state: &DVector<f64>,
    ) -> f64 {
        let err_radius = rss_state(
            &slice3(error_est, 0),
            &slice3(candidate, 0),
            &slice3(cur_state, 0),
        );
        let err_velocity = rss_state(
            &slice3(error_est, 3),
            &slice3(candidate, 3),
            &slice3(cur_state, 3),
        );
        err_radius.max(err_velocity)
    }
}

/// Largest error of the columns of the Jacobian block, each column being handled as an orbital state by `E`.
///
/// The Jacobian evolves with the Cartesian dynamics, so it may require much smaller steps than the orbit when
/// the latter is integrated in slowly varying elements. Returns zero if the layout has no Jacobian.
pub fn jacobian_error<E: ErrorCtrl>(
    error_est: &DVector<f64>,
    candidate: &DVector<f64>,
    cur_state: &DVector<f64>,
    layout: &StateLayout,
) -> f64 {
    if !layout.with_jacobian {
        return 0.0;
    }
    let offset = layout.jacobian_offset();
    (0..layout.jacobian_cols())
        .map(|col| {
            let start = offset + 6 * col;
            let column = |v: &DVector<f64>| DVector::from_column_slice(&v.as_slice()[start..start + 6]);
            E::estimate(&column(error_est), &column(candidate), &column(cur_state))
        })
        .fold(0.0, f64::max)
}

/// An RSS step error control which effectively computes the L2 norm of the provided Vector of size 3
pub fn rss_step(prop_err: &Vector3<f64>, candidate: &Vector3<f64>, cur_state: &Vector3<f64>) -> f64 {
    let mag = (candidate - cur_state).norm();
    let err = prop_err.norm();
    if mag > REL_ERR_THRESH {
        err / mag
    } else {
        err
    }
}

/// An RSS state error control which computes the error relative to the mean magnitude of both states
pub fn rss_state(
    prop_err: &Vector3<f64>,
    candidate: &Vector3<f64>,
    cur_state: &Vector3<f64>,
) -> f64 {
    let mag = 0.5 * (candidate + cur_state).norm();
    let err = prop_err.norm();
    if mag > REL_ERR_THRESH {
        err / mag
    } else {
        err
    }
}

#[cfg(test)]
mod ut_error_ctrl {
    use super::*;

    #[test]
    fn only_orbit_drives_error() {
        let cur = DVector::from_vec(vec![7000.0, 0.0, 0.0, 0.0, 7.5, 0.0, 100.0, 1.0]);
        let candidate = DVector::from_vec(vec![7000.0, 75.0, 0.0, -0.08, 7.5, 0.0, 100.0, 1.0]);
        let mut error_est = DVector::zeros(8);
        error_est[1] = 1e-9;
        let small = RSSCartesianStep::estimate(&error_est, &candidate, &cur);
        assert!((small - 1e-9 / 75.0).abs() < 1e-20);
        // A huge error on the non orbital components is ignored
        error_est[7] = 1e3;
        assert_eq!(RSSCartesianStep::estimate(&error_est, &candidate, &cur), small);
        assert_eq!(LargestError::estimate(&error_est, &candidate, &cur), 1e-9 / 75.0);
        assert!(RSSCartesianState::estimate(&error_est, &candidate, &cur) < small);
    }

    #[test]
    fn jacobian_columns_drive_error() {
        let layout = StateLayout::with_jacobian(0, vec!["Cd".to_string()]);
        let cur = DVector::from_element(layout.len(), 1.0);
        let candidate = cur.clone();
        let mut error_est = DVector::zeros(layout.len());
        assert_eq!(jacobian_error::<RSSCartesianStep>(&error_est, &candidate, &cur, &layout), 0.0);

        // Velocity rows of the parameter column
        let last = layout.jacobian_offset() + 6 * 6;
        error_est[last + 4] = 3e-9;
        error_est[last + 5] = 4e-9;
        let err = jacobian_error::<RSSCartesianStep>(&error_est, &candidate, &cur, &layout);
        assert!((err - 5e-9).abs() < 1e-20);
        // The orbital components alone do not see it
        assert_eq!(RSSCartesianStep::estimate(&error_est, &candidate, &cur), 0.0);

        let no_jacobian = StateLayout::new(0);
        assert_eq!(jacobian_error::<LargestError>(&error_est, &candidate, &cur, &no_jacobian), 0.0);
    }
}
