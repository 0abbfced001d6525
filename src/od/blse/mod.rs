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
use crate::dynamics::SpacecraftDynamics;
use crate::errors::ConfigError;
use crate::io::ConfigRepr;
use crate::linalg::{DMatrix, DVector};
use crate::od::msr::{Measurement, MeasurementError};
use crate::od::{EstimationParameterSet, PropagatorBuilder};
use crate::propagators::{ErrorCtrl, PropagationError, Propagator, StoppedBeforeSnafu};
use crate::time::Epoch;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use typed_builder::TypedBuilder;

mod solution;
pub use solution::{BLSDiagnostics, BLSSolution, ResidualRecord};

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BLSError {
    #[snafu(display("propagation of arc #{arc} failed: {source}"))]
    Propagation {
        arc: usize,
        source: PropagationError,
    },
    #[snafu(display("measurement could not be evaluated: {source}"))]
    Measurement { source: MeasurementError },
    #[snafu(display("estimator configuration error: {source}"))]
    BLSConfig { source: ConfigError },
    #[snafu(display("state of arc #{arc} @ {epoch} has no Jacobian"))]
    MissingJacobian { arc: usize, epoch: Epoch },
    #[snafu(display("singular normal equations: {details}"))]
    SingularMatrix { details: String },
    #[snafu(display("too few measurement components ({count}) to estimate {needed} parameters"))]
    TooFewMeasurements { count: usize, needed: usize },
    #[snafu(display("no parameter is estimated"))]
    NoEstimatedParameters,
    #[snafu(display("maximum iterations ({max_iterations}) reached without convergence"))]
    MaxIterationsReached { max_iterations: usize },
    #[snafu(display("maximum evaluations ({max_evaluations}) reached without convergence"))]
    MaxEvaluationsReached { max_evaluations: usize },
}

/// Solver of the normal equations
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BLSSolver {
    /// (HᵀWH) dx = HᵀW dy
    #[default]
    GaussNewton,
    /// (HᵀWH + λ diag(HᵀWH)) dx = HᵀW dy, where a step is only accepted if it decreases the cost
    LevenbergMarquardt,
}

impl fmt::Display for BLSSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GaussNewton => write!(f, "Gauss-Newton"),
            Self::LevenbergMarquardt => write!(f, "Levenberg-Marquardt"),
        }
    }
}

/// Settings of the estimator which may be loaded from YAML
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BLSSettings {
    #[serde(default)]
    pub solver: BLSSolver,
    pub relative_threshold: f64,
    pub absolute_threshold: f64,
    pub max_iterations: usize,
    pub max_evaluations: usize,
    #[serde(default = "default_lm_lambda_init")]
    pub lm_lambda_init: f64,
}

fn default_lm_lambda_init() -> f64 {
    1e-3
}

impl ConfigRepr for BLSSettings {}

/// A multi-arc batch least squares estimator.
///
/// Each arc is described by a [PropagatorBuilder], and the estimated parameters are the orbital elements of the
/// arcs, the selected parameters of their dynamics, and the estimated parameters of the measurements. At every
/// evaluation, the propagators are rebuilt from a snapshot of all the parameters, the arcs are propagated in
/// parallel to the measurement epochs, and the normal equations are assembled in normalized parameters.
#[derive(Clone, TypedBuilder)]
#[builder(doc)]
pub struct BatchLeastSquares<E: ErrorCtrl> {
    /// One builder per arc; the propagator index of a measurement is the index of its builder
    pub builders: Vec<PropagatorBuilder<E>>,
    #[builder(default)]
    pub solver: BLSSolver,
    /// Convergence threshold on the norm of the normalized update, relative to the norm of the normalized parameters
    #[builder(default = 1e-6)]
    pub relative_threshold: f64,
    /// Convergence threshold on the largest component of the normalized update
    #[builder(default = 1e-3)]
    pub absolute_threshold: f64,
    #[builder(default = 10)]
    pub max_iterations: usize,
    #[builder(default = 20)]
    pub max_evaluations: usize,
    /// Initial damping factor for Levenberg-Marquardt
    #[builder(default = 1e-3)]
    pub lm_lambda_init: f64,
    /// Factor to increase lambda by when a step is rejected
    #[builder(default = 10.0)]
    pub lm_lambda_increase: f64,
    /// Factor to decrease lambda by when a step is accepted
    #[builder(default = 10.0)]
    pub lm_lambda_decrease: f64,
    #[builder(default = 1e-12)]
    pub lm_lambda_min: f64,
    #[builder(default = 1e12)]
    pub lm_lambda_max: f64,
    #[builder(default, setter(skip))]
    measurements: Vec<Measurement>,
    #[builder(default, setter(skip))]
    diagnostics: Option<BLSDiagnostics>,
}

/// Result of an evaluation of all the measurements at a snapshot of the parameters
struct Evaluation {
    states: Vec<SpacecraftState>,
    residuals: Vec<ResidualRecord>,
    /// HᵀWH, in normalized parameters
    normal: DMatrix<f64>,
    /// HᵀW dy, in normalized parameters
    gradient: DVector<f64>,
    /// dyᵀW dy
    cost: f64,
    rms: f64,
}

impl<E: ErrorCtrl> BatchLeastSquares<E> {
    /// Builds an estimator from settings, e.g. loaded from YAML
    pub fn from_settings(builders: Vec<PropagatorBuilder<E>>, settings: BLSSettings) -> Self {
        Self::builder()
            .builders(builders)
            .solver(settings.solver)
            .relative_threshold(settings.relative_threshold)
            .absolute_threshold(settings.absolute_threshold)
            .max_iterations(settings.max_iterations)
            .max_evaluations(settings.max_evaluations)
            .lm_lambda_init(settings.lm_lambda_init)
            .build()
    }

    pub fn add_measurement(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    pub fn add_measurements<I: IntoIterator<Item = Measurement>>(&mut self, measurements: I) {
        self.measurements.extend(measurements);
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn set_convergence_threshold(&mut self, relative: f64, absolute: f64) {
        self.relative_threshold = relative;
        self.absolute_threshold = absolute;
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    pub fn set_max_evaluations(&mut self, max_evaluations: usize) {
        self.max_evaluations = max_evaluations;
    }

    /// Residuals, RMS and covariance of the last evaluation of the last run, successful or not
    pub fn diagnostics(&self) -> Option<&BLSDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// All the parameters of this estimation at their reference values
    pub fn parameters(&self) -> Result<EstimationParameterSet, BLSError> {
        let arcs = self
            .builders
            .iter()
            .map(|builder| builder.arc_drivers())
            .collect::<Result<Vec<_>, _>>()
            .context(BLSConfigSnafu)?;
        let mut params = EstimationParameterSet::new(arcs);
        for msr in &self.measurements {
            for driver in msr.parameter_drivers() {
                params.add_measurement_driver(driver);
            }
        }
        Ok(params)
    }

    /// Runs the estimation from the reference values of the parameters.
    pub fn estimate(&mut self) -> Result<BLSSolution, BLSError> {
        self.diagnostics = None;
        let mut params = self.parameters()?;
        self.check(&params)?;

        info!(
            "Starting {} batch least squares with {} measurements over {} arc(s), {} estimated parameters",
            self.solver,
            self.measurements.len(),
            self.builders.len(),
            params.estimated_count()
        );

        let mut iterations = 0;
        let mut evaluations = 0;
        let mut lambda = self.lm_lambda_init;
        let mut current = self.evaluate_and_record(&params, iterations, &mut evaluations)?;
        info!("[0/{}] RMS: {:.6}", self.max_iterations, current.rms);

        loop {
            ensure!(
                iterations < self.max_iterations,
                MaxIterationsReachedSnafu {
                    max_iterations: self.max_iterations
                }
            );
            iterations += 1;

            let previous = params.normalized();
            match self.solver {
                BLSSolver::GaussNewton => {
                    let delta = solve(&current.normal, &current.gradient).context(
                        SingularMatrixSnafu {
                            details: format!("HᵀWH is singular in iteration {iterations}"),
                        },
                    )?;
                    let clipped = params.apply_normalized_update(&delta);
                    if clipped > 0 {
                        debug!("{clipped} parameter(s) clipped to their bounds");
                    }
                    current = self.evaluate_and_record(&params, iterations, &mut evaluations)?;
                }
                BLSSolver::LevenbergMarquardt => loop {
                    let mut augmented = current.normal.clone();
                    for i in 0..augmented.nrows() {
                        let mut diag = current.normal[(i, i)];
                        if diag <= 0.0 {
                            warn!("LM scaling: non-positive diagonal element {diag} in HᵀWH, using floor");
                            diag = 1e-6;
                        }
                        augmented[(i, i)] += lambda * diag;
                    }
                    let Some(delta) = solve(&augmented, &current.gradient) else {
                        warn!("LM: HᵀWH + λ diag(HᵀWH) singular with λ = {lambda:e}");
                        ensure!(
                            lambda < self.lm_lambda_max,
                            SingularMatrixSnafu {
                                details: format!(
                                    "damped normal equations singular up to λ = {lambda:e}"
                                )
                            }
                        );
                        lambda = (lambda * self.lm_lambda_increase).min(self.lm_lambda_max);
                        continue;
                    };

                    let mut trial = params.clone();
                    trial.apply_normalized_update(&delta);
                    let evaluation =
                        self.evaluate_and_record(&trial, iterations, &mut evaluations)?;
                    if evaluation.cost <= current.cost {
                        lambda = (lambda / self.lm_lambda_decrease).max(self.lm_lambda_min);
                        debug!(
                            "LM: cost decreased ({:e} -> {:e}), λ = {lambda:e}",
                            current.cost, evaluation.cost
                        );
                        params = trial;
                        current = evaluation;
                        break;
                    }
                    lambda = (lambda * self.lm_lambda_increase).min(self.lm_lambda_max);
                    debug!(
                        "LM: cost increased ({:e} -> {:e}), step rejected, λ = {lambda:e}",
                        current.cost, evaluation.cost
                    );
                },
            }

            let normalized = params.normalized();
            let update = &normalized - &previous;
            info!(
                "[{iterations}/{}] RMS: {:.6}; normalized update: {:.3e}",
                self.max_iterations,
                current.rms,
                update.norm()
            );

            if update.norm() <= self.relative_threshold * normalized.norm().max(1.0)
                && update.amax() <= self.absolute_threshold
            {
                info!("Converged in {iterations} iterations and {evaluations} evaluations");
                let covariance = covariance(&current.normal, &params.scales()).context(
                    SingularMatrixSnafu {
                        details: "HᵀWH is singular at the solution".to_string(),
                    },
                )?;
                return Ok(BLSSolution {
                    parameters: params,
                    states: current.states,
                    covariance,
                    iterations,
                    evaluations,
                    rms: current.rms,
                    residuals: current.residuals,
                });
            }
        }
    }

    /// Checks the estimation may run before any evaluation
    fn check(&self, params: &EstimationParameterSet) -> Result<(), BLSError> {
        let needed = params.estimated_count();
        ensure!(needed > 0, NoEstimatedParametersSnafu);

        for msr in &self.measurements {
            if let Some(arc) = msr.propagators.iter().find(|&&p| p >= self.builders.len()) {
                return Err(BLSError::BLSConfig {
                    source: ConfigError::InvalidConfig {
                        msg: format!(
                            "{msr} refers to arc #{arc} but only {} arc(s) are configured",
                            self.builders.len()
                        ),
                    },
                });
            }
        }

        let count = self.measurements.iter().map(|m| m.dimension()).sum::<usize>();
        ensure!(count >= needed, TooFewMeasurementsSnafu { count, needed });
        Ok(())
    }

    /// Evaluates the parameters within the evaluation budget, and records the diagnostics of this evaluation
    fn evaluate_and_record(
        &mut self,
        params: &EstimationParameterSet,
        iterations: usize,
        evaluations: &mut usize,
    ) -> Result<Evaluation, BLSError> {
        ensure!(
            *evaluations < self.max_evaluations,
            MaxEvaluationsReachedSnafu {
                max_evaluations: self.max_evaluations
            }
        );
        *evaluations += 1;
        let evaluation = self.evaluate(params)?;
        self.diagnostics = Some(BLSDiagnostics {
            parameters: params.clone(),
            iterations,
            evaluations: *evaluations,
            rms: evaluation.rms,
            cost: evaluation.cost,
            residuals: evaluation.residuals.clone(),
            covariance: covariance(&evaluation.normal, &params.scales()),
        });
        Ok(evaluation)
    }

    /// Evaluates all the measurements from a snapshot of the parameters
    fn evaluate(&self, params: &EstimationParameterSet) -> Result<Evaluation, BLSError> {
        let n = params.estimated_count();
        let scales = params.scales();

        let built = self
            .builders
            .iter()
            .zip(params.arcs.iter())
            .map(|(builder, drivers)| builder.build(drivers))
            .collect::<Result<Vec<_>, _>>()
            .context(BLSConfigSnafu)?;

        let mut epochs = vec![BTreeSet::new(); built.len()];
        for msr in &self.measurements {
            for &arc in &msr.propagators {
                epochs[arc].insert(msr.epoch);
            }
        }

        let arcs = built
            .par_iter()
            .zip(epochs.par_iter())
            .enumerate()
            .map(|(arc, ((prop, state), epochs))| {
                propagate_arc(prop, state, epochs).context(PropagationSnafu { arc })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut normal = DMatrix::zeros(n, n);
        let mut gradient = DVector::zeros(n);
        let mut cost = 0.0;
        let mut components = 0;
        let mut residuals = Vec::with_capacity(self.measurements.len());

        for msr in &self.measurements {
            let states = msr
                .propagators
                .iter()
                .map(|&arc| {
                    arcs[arc].get(&msr.epoch).ok_or_else(|| BLSError::Measurement {
                        source: MeasurementError::MissingStates {
                            kind: msr.kind(),
                            epoch: msr.epoch,
                            expected: msr.propagators.len(),
                            got: 0,
                        },
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let estimated = msr
                .estimate(&states, &params.measurements)
                .context(MeasurementSnafu)?;
            let residual = &msr.observed - &estimated.value;
            let weights = msr.weights();

            // Partials with respect to the normalized parameters
            let mut h = DMatrix::zeros(msr.dimension(), n);
            for (k, &arc) in msr.propagators.iter().enumerate() {
                let jacobian = states[k].jacobian.as_ref().context(MissingJacobianSnafu {
                    arc,
                    epoch: msr.epoch,
                })?;
                let hj = &estimated.state_partials[k] * jacobian;
                for i in 0..6 {
                    if let Some(col) = params.orbital_index(arc, i) {
                        h.column_mut(col).axpy(scales[col], &hj.column(i), 1.0);
                    }
                }
                for (j, driver) in params.arcs[arc]
                    .propagation
                    .iter()
                    .filter(|d| d.estimated)
                    .enumerate()
                {
                    if let Some(col) = params.propagation_index(arc, &driver.name) {
                        h.column_mut(col).axpy(scales[col], &hj.column(6 + j), 1.0);
                    }
                }
            }
            for (name, partial) in &estimated.parameter_partials {
                if let Some(col) = params.measurement_index(name) {
                    h.column_mut(col).axpy(scales[col], partial, 1.0);
                }
            }

            let hw = h.transpose() * DMatrix::from_diagonal(&weights);
            normal += &hw * &h;
            gradient += &hw * &residual;
            cost += residual
                .iter()
                .zip(weights.iter())
                .map(|(r, w)| w * r * r)
                .sum::<f64>();
            components += msr.dimension();

            residuals.push(ResidualRecord {
                epoch: msr.epoch,
                kind: msr.kind(),
                observed: msr.observed.clone(),
                estimated: estimated.value,
                residual,
                weights,
            });
        }

        Ok(Evaluation {
            states: built.into_iter().map(|(_, state)| state).collect(),
            residuals,
            normal,
            gradient,
            cost,
            rms: (cost / components.max(1) as f64).sqrt(),
        })
    }
}

/// Propagates an arc from its reference epoch to each epoch, forward then backward.
fn propagate_arc<E: ErrorCtrl>(
    prop: &Propagator<SpacecraftDynamics, E>,
    initial: &SpacecraftState,
    epochs: &BTreeSet<Epoch>,
) -> Result<BTreeMap<Epoch, SpacecraftState>, PropagationError> {
    let reference = initial.epoch();
    let mut states = BTreeMap::new();

    let forward = epochs.range(reference..);
    let backward = epochs.range(..reference).rev();
    for run in [forward.collect::<Vec<_>>(), backward.collect()] {
        let mut instance = prop.with(initial.clone())?;
        for epoch in run {
            let state = instance.until_epoch(*epoch)?;
            ensure!(
                state.epoch() == *epoch,
                StoppedBeforeSnafu {
                    target: *epoch,
                    stopped: state.epoch()
                }
            );
            states.insert(*epoch, state);
        }
    }

    Ok(states)
}

fn solve(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    matrix.clone().cholesky().map(|chol| chol.solve(rhs))
}

/// Covariance of the parameters in their physical units, from the normal matrix in normalized parameters
fn covariance(normal: &DMatrix<f64>, scales: &DVector<f64>) -> Option<DMatrix<f64>> {
    let inverse = normal.clone().cholesky()?.inverse();
    let s = DMatrix::from_diagonal(scales);
    Some(&s * inverse * &s)
}

impl<E: ErrorCtrl> fmt::Display for BatchLeastSquares<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batch least squares over {} arc(s) with {} measurement(s)",
            self.solver,
            self.builders.len(),
            self.measurements.len()
        )
    }
}
