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

use crate::errors::{ConfigError, InvalidConfigSnafu};
use serde_derive::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

/// A scalar parameter which may be estimated, e.g. an orbital element, a drag coefficient or a range bias.
///
/// The estimator works on normalized values, `(value - reference) / scale`, so that parameters of very
/// different magnitudes are updated consistently. The value is always clipped to `[min_value, max_value]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDriver {
    pub name: String,
    pub reference_value: f64,
    value: f64,
    pub scale: f64,
    pub min_value: f64,
    pub max_value: f64,
    #[serde(default)]
    pub estimated: bool,
}

impl ParameterDriver {
    /// Creates a new driver whose current value is its reference value.
    pub fn new(
        name: &str,
        reference_value: f64,
        scale: f64,
        min_value: f64,
        max_value: f64,
    ) -> Result<Self, ConfigError> {
        ensure!(
            scale.is_finite() && scale > 0.0,
            InvalidConfigSnafu {
                msg: format!("scale of {name} must be strictly positive, got {scale}")
            }
        );
        ensure!(
            min_value <= max_value,
            InvalidConfigSnafu {
                msg: format!("bounds of {name} are inverted: [{min_value}, {max_value}]")
            }
        );
        ensure!(
            (min_value..=max_value).contains(&reference_value),
            InvalidConfigSnafu {
                msg: format!(
                    "reference value of {name} ({reference_value}) is out of bounds [{min_value}, {max_value}]"
                )
            }
        );
        Ok(Self {
            name: name.to_string(),
            reference_value,
            value: reference_value,
            scale,
            min_value,
            max_value,
            estimated: false,
        })
    }

    /// Creates a new driver without bounds.
    pub fn unbounded(name: &str, reference_value: f64, scale: f64) -> Result<Self, ConfigError> {
        Self::new(
            name,
            reference_value,
            scale,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
    }

    /// Marks this driver as estimated
    pub fn estimated(mut self) -> Self {
        self.estimated = true;
        self
    }

    pub fn with_estimated(mut self, estimated: bool) -> Self {
        self.estimated = estimated;
        self
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Sets the value of this driver, clipping it to its bounds. Returns true if the value was clipped.
    pub fn set_value(&mut self, value: f64) -> bool {
        let clipped = value.clamp(self.min_value, self.max_value);
        if clipped != value {
            debug!(
                "{} clipped from {value} to {clipped} (bounds [{}, {}])",
                self.name, self.min_value, self.max_value
            );
        }
        self.value = clipped;
        clipped != value
    }

    pub fn normalized_value(&self) -> f64 {
        (self.value - self.reference_value) / self.scale
    }

    /// Sets the value from its normalized value, clipping it to its bounds. Returns true if the value was clipped.
    pub fn set_normalized_value(&mut self, normalized: f64) -> bool {
        self.set_value(self.reference_value + self.scale * normalized)
    }

    /// Resets the current value to the reference value
    pub fn reset(&mut self) {
        self.value = self.reference_value;
    }
}

impl fmt::Display for ParameterDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {:e} (ref. {:e}, scale {:e}){}",
            self.name,
            self.value,
            self.reference_value,
            self.scale,
            if self.estimated { " [estimated]" } else { "" }
        )
    }
}

#[cfg(test)]
mod ut_param {
    use super::*;

    #[test]
    fn clipping_and_normalization() {
        let mut cd = ParameterDriver::new("Cd", 2.2, 0.1, 1.0, 3.0).unwrap();
        assert!(!cd.estimated);
        assert_eq!(cd.value(), 2.2);
        assert!(!cd.set_normalized_value(3.0));
        assert!((cd.value() - 2.5).abs() < 1e-12);
        assert!((cd.normalized_value() - 3.0).abs() < 1e-12);
        // Clipped to the upper bound
        assert!(cd.set_value(4.0));
        assert_eq!(cd.value(), 3.0);
        assert!(cd.set_normalized_value(-20.0));
        assert_eq!(cd.value(), 1.0);
        cd.reset();
        assert_eq!(cd.value(), 2.2);
        assert!(cd.estimated().estimated);
    }

    #[test]
    fn invalid_drivers() {
        assert!(ParameterDriver::new("bias", 0.0, 0.0, -1.0, 1.0).is_err());
        assert!(ParameterDriver::new("bias", 0.0, 1.0, 1.0, -1.0).is_err());
        assert!(ParameterDriver::new("bias", 2.0, 1.0, -1.0, 1.0).is_err());
        assert!(ParameterDriver::unbounded("bias", 1e6, 1.0).is_ok());
    }
}
