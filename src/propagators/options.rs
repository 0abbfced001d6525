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

use super::{ErrorCtrl, RSSCartesianStep};
use crate::errors::{ConfigError, InvalidConfigSnafu};
use crate::time::{Duration, Unit};
use snafu::ensure;
use std::fmt;
use typed_builder::TypedBuilder;

/// Integration options: the step bounds, the initial step and the tolerance of the adaptive step control.
///
/// In fixed step mode, the step is `init_step` and the error estimate is ignored. The steps are only ever
/// shortened to land exactly on a target epoch or on an event.
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(doc)]
pub struct PropOpts<E: ErrorCtrl> {
    #[builder(default_code = "60.0 * Unit::Second")]
    pub init_step: Duration,
    #[builder(default_code = "0.001 * Unit::Second")]
    pub min_step: Duration,
    #[builder(default_code = "2700.0 * Unit::Second")]
    pub max_step: Duration,
    #[builder(default = 1e-12)]
    pub tolerance: f64,
    /// Number of step reductions after which a step above tolerance is accepted, with a warning
    #[builder(default = 50)]
    pub attempts: u8,
    #[builder(default = false)]
    pub fixed_step: bool,
    pub error_ctrl: E,
}

impl<E: ErrorCtrl> PropOpts<E> {
    /// Adaptive step options, starting with the largest step allowed
    pub fn with_adaptive_step(
        min_step: Duration,
        max_step: Duration,
        tolerance: f64,
        error_ctrl: E,
    ) -> Self {
        Self {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            fixed_step: false,
            error_ctrl,
        }
    }

    pub fn with_adaptive_step_s(
        min_step_s: f64,
        max_step_s: f64,
        tolerance: f64,
        error_ctrl: E,
    ) -> Self {
        Self::with_adaptive_step(
            min_step_s * Unit::Second,
            max_step_s * Unit::Second,
            tolerance,
            error_ctrl,
        )
    }

    /// Sets the largest step, and clamps the initial step to it
    pub fn set_max_step(&mut self, max_step: Duration) {
        self.max_step = max_step;
        self.init_step = self.init_step.min(max_step);
    }

    /// Sets the smallest step, and raises the initial step to it
    pub fn set_min_step(&mut self, min_step: Duration) {
        self.min_step = min_step;
        self.init_step = self.init_step.max(min_step);
    }

    /// Checks that the steps are positive and ordered, and that the tolerance of an adaptive step is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.init_step > Duration::ZERO,
            InvalidConfigSnafu {
                msg: format!("initial step must be positive, got {}", self.init_step)
            }
        );
        if self.fixed_step {
            return Ok(());
        }
        ensure!(
            self.min_step > Duration::ZERO && self.min_step <= self.max_step,
            InvalidConfigSnafu {
                msg: format!(
                    "step bounds must satisfy 0 < min <= max, got [{}, {}]",
                    self.min_step, self.max_step
                )
            }
        );
        ensure!(
            self.tolerance > 0.0 && self.tolerance.is_finite(),
            InvalidConfigSnafu {
                msg: format!("tolerance must be positive, got {}", self.tolerance)
            }
        );
        Ok(())
    }
}

impl<E: ErrorCtrl> fmt::Display for PropOpts<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixed_step {
            write!(f, "fixed step of {}", self.init_step)
        } else {
            write!(
                f,
                "adaptive step in [{}, {}] with tolerance {:e} ({} attempts)",
                self.min_step, self.max_step, self.tolerance, self.attempts
            )
        }
    }
}

impl PropOpts<RSSCartesianStep> {
    /// Fixed step options, with the RSS Cartesian error control which is unused in that mode
    pub fn with_fixed_step(step: Duration) -> Self {
        Self {
            init_step: step,
            min_step: step,
            max_step: step,
            tolerance: 0.0,
            attempts: 0,
            fixed_step: true,
            error_ctrl: RSSCartesianStep,
        }
    }

    pub fn with_fixed_step_s(step_s: f64) -> Self {
        Self::with_fixed_step(step_s * Unit::Second)
    }

    /// Default options with another tolerance
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Default::default()
        }
    }

    /// Default options with another largest step
    pub fn with_max_step(max_step: Duration) -> Self {
        let mut opts = Self::default();
        opts.set_max_step(max_step);
        opts
    }
}

impl Default for PropOpts<RSSCartesianStep> {
    fn default() -> Self {
        Self::builder().error_ctrl(RSSCartesianStep).build()
    }
}
