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

use crate::cosmic::SpacecraftState;
use crate::linalg::{DMatrix, DVector};
use crate::od::msr::MeasurementType;
use crate::od::EstimationParameterSet;
use crate::time::Epoch;
use std::fmt;

/// Residual of one measurement: observed minus estimated, with the weight of each component.
#[derive(Clone, Debug, PartialEq)]
pub struct ResidualRecord {
    pub epoch: Epoch,
    pub kind: MeasurementType,
    pub observed: DVector<f64>,
    pub estimated: DVector<f64>,
    pub residual: DVector<f64>,
    pub weights: DVector<f64>,
}

impl fmt::Display for ResidualRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: residual", self.kind, self.epoch)?;
        for value in self.residual.iter() {
            write!(f, " {value:.6e}")?;
        }
        write!(f, " {}", self.kind.unit())
    }
}

/// State of the estimator at its last evaluation, available whether the estimation succeeded or not
#[derive(Clone, Debug, PartialEq)]
pub struct BLSDiagnostics {
    /// Parameters of the last evaluation
    pub parameters: EstimationParameterSet,
    pub iterations: usize,
    pub evaluations: usize,
    /// Weighted RMS of the residuals
    pub rms: f64,
    /// Weighted sum of squares of the residuals
    pub cost: f64,
    pub residuals: Vec<ResidualRecord>,
    /// Covariance of the estimated parameters, if the normal equations could be inverted
    pub covariance: Option<DMatrix<f64>>,
}

impl fmt::Display for BLSDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Evaluations: {}", self.evaluations)?;
        writeln!(f, "RMS: {:.6}", self.rms)?;
        write!(f, "Parameters:\n{}", self.parameters)
    }
}

/// The converged solution of a batch least squares estimation
#[derive(Clone, Debug, PartialEq)]
pub struct BLSSolution {
    /// All the parameters, with the estimated ones at their solved values
    pub parameters: EstimationParameterSet,
    /// Estimated state of each arc at its reference epoch
    pub states: Vec<SpacecraftState>,
    /// Covariance of the estimated parameters, in their physical units and in the order of the parameter set
    pub covariance: DMatrix<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    /// Weighted RMS of the residuals at the solution
    pub rms: f64,
    pub residuals: Vec<ResidualRecord>,
}

impl BLSSolution {
    /// Standard deviation of each estimated parameter, in the order of the parameter set
    pub fn sigmas(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.sqrt())
    }
}

impl fmt::Display for BLSSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Evaluations: {}", self.evaluations)?;
        writeln!(f, "Final RMS: {:.6}", self.rms)?;
        for (i, state) in self.states.iter().enumerate() {
            writeln!(f, "Arc #{i}: {}", state.orbit)?;
        }
        for (driver, sigma) in self.parameters.estimated().zip(self.sigmas().iter()) {
            writeln!(f, "\t{driver} (σ = {sigma:.3e})")?;
        }
        write!(f, "Final covariance:\n{:.3e}", self.covariance)
    }
}
