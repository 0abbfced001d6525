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

use super::error_ctrl::{jacobian_error, ErrorCtrl};
use super::{
    DynamicsSnafu, IntegrationDetails, PropEventSnafu, PropagationError, Propagator,
    ResetEpochSnafu, StateLengthSnafu, StateMapper, StepUnderflowSnafu, MASS_INDEX,
};
use crate::cosmic::SpacecraftState;
use crate::dynamics::Dynamics;
use crate::errors::EventError;
use crate::linalg::{DMatrix, DVector};
use crate::md::events::search::{brent, Bracket, RootSearch};
use crate::md::events::{Action, EventDetector, EventOccurrence};
use crate::time::{Duration, Epoch, Unit};
use snafu::{ensure, ResultExt};
use std::f64;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// A propagator instance integrates a state with the dynamics, the options and the detectors of its propagator.
pub struct PropInstance<'a, D: Dynamics, E: ErrorCtrl> {
    /// The state of this propagator instance
    pub state: SpacecraftState,
    /// The propagator setup (kind, stages, etc.)
    pub prop: &'a Propagator<D, E>,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    /// Maps the state to the integrated vector, with the initial epoch of this instance as reference
    pub mapper: StateMapper,
    pub(crate) step_size: Duration, // Stores the adapted step for the _next_ call
    pub(crate) fixed_step: bool,
    // Allows us to do pre-allocation of the ki vectors
    pub(crate) k: Vec<DVector<f64>>,
    pub(crate) event_log: Vec<EventOccurrence>,
}

/// Search state of a detector during a propagation run
#[derive(Copy, Clone, Debug)]
struct DetectorTracker {
    /// Value of the switching function at the current time
    g: f64,
    /// Sign of the switching function at the current time, which is forced after an event
    positive: bool,
    /// Time of the last event of this detector, or of the start of the run
    last_event: Option<f64>,
}

/// An event located within a step
#[derive(Copy, Clone, Debug)]
struct Candidate {
    t: f64,
    index: usize,
    increasing: bool,
    threshold_s: f64,
}

enum Dispatch {
    Continue,
    Stop,
    Reset(SpacecraftState),
}

/// Cubic Hermite interpolation of the raw state over an accepted step, from the states and derivatives at both ends
struct StepInterpolant<'s> {
    t_a: f64,
    t_b: f64,
    h: f64,
    y_a: &'s DVector<f64>,
    y_b: &'s DVector<f64>,
    f_a: &'s DVector<f64>,
    f_b: &'s DVector<f64>,
}

impl<'s> StepInterpolant<'s> {
    fn at(&self, t: f64) -> DVector<f64> {
        if t == self.t_b {
            return self.y_b.clone();
        }
        let s = (t - self.t_a) / self.h;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        self.y_a * h00 + self.f_a * (h10 * self.h) + self.y_b * h01 + self.f_b * (h11 * self.h)
    }
}

impl<'a, D: Dynamics, E: ErrorCtrl> PropInstance<'a, D, E> {
    /// Allows setting the step size of the propagator
    pub fn set_step(&mut self, step_size: Duration, fixed: bool) {
        self.step_size = step_size.abs();
        self.fixed_step = fixed;
    }

    /// Events which occurred since this instance was created, in chronological order
    pub fn event_log(&self) -> &[EventOccurrence] {
        &self.event_log
    }

    /// This method propagates the provided Dynamics for the provided duration, which may be negative.
    ///
    /// The propagation ends at the requested epoch, unless a detector stops it earlier: the returned state is then
    /// the state at the event epoch.
    pub fn for_duration(&mut self, duration: Duration) -> Result<SpacecraftState, PropagationError> {
        if duration == 0 * Unit::Second {
            return Ok(self.state.clone());
        }
        let stop_time = self.state.epoch() + duration;

        #[cfg(not(target_arch = "wasm32"))]
        let tick = Instant::now();
        let log_progress = duration.abs() >= 2 * Unit::Minute;

        if log_progress {
            // Prevent the print spam for orbit determination cases
            info!("Propagating for {} until {}", duration, stop_time);
        }

        let backprop = duration.is_negative();
        let dir = if backprop { -1.0 } else { 1.0 };

        let mut y = DVector::zeros(self.mapper.layout().len());
        self.mapper.map_state_to_array(&self.state, &mut y)?;
        let mut t = self.mapper.map_date_to_double(self.state.epoch());
        let t_stop = self.mapper.map_date_to_double(stop_time);
        let mut trackers = self.init_trackers(t, &self.state)?;
        // Derivatives at (t, y), reused from the end of the previous step
        let mut k0: Option<DVector<f64>> = None;

        while t != t_stop {
            let remaining = t_stop - t;
            let adapted = self.step_size.to_seconds();
            let final_step = adapted >= remaining.abs();
            // Take one final step of exactly the needed duration until the stop time
            let (step, fixed) = if final_step {
                (remaining, true)
            } else {
                (dir * adapted, self.fixed_step)
            };

            let f_a = match k0.take() {
                Some(f_a) => f_a,
                None => self.derivatives(t, &y)?,
            };
            let (step_used, y_b) = self.derive(t, &y, &f_a, step, fixed)?;
            let t_b = if final_step { t_stop } else { t + step_used };

            if self.prop.detectors.is_empty() {
                t = t_b;
                y = y_b;
                continue;
            }

            let f_b = self.derivatives(t_b, &y_b)?;
            let interp = StepInterpolant {
                t_a: t,
                t_b,
                h: t_b - t,
                y_a: &y,
                y_b: &y_b,
                f_a: &f_a,
                f_b: &f_b,
            };
            let (mut candidates, g_end) = self.find_events(&trackers, &interp, !backprop)?;

            if candidates.is_empty() {
                for (tracker, g) in trackers.iter_mut().zip(g_end) {
                    if let Some(g) = g {
                        tracker.g = g;
                        tracker.positive = g >= 0.0;
                    }
                }
                t = t_b;
                y = y_b;
                k0 = Some(f_b);
                continue;
            }

            // The earliest event wins, ties are broken by the order of registration
            candidates.sort_by(|a, b| {
                (dir * a.t)
                    .total_cmp(&(dir * b.t))
                    .then(a.index.cmp(&b.index))
            });
            let first = candidates[0];
            let mut group: Vec<Candidate> = candidates
                .into_iter()
                .filter(|c| (c.t - first.t).abs() <= c.threshold_s.max(first.threshold_s))
                .collect();
            group.sort_by_key(|c| c.index);
            let t_event = first.t;

            // Integrate exactly until the event
            let y_event = if t_event == t {
                y.clone()
            } else if t_event == t_b {
                y_b.clone()
            } else {
                self.derive(t, &y, &f_a, t_event - t, true)?.1
            };
            let epoch = self.mapper.map_double_to_date_expected(t_event, stop_time);
            let event_state = self.mapper.decode(epoch, &y_event, true)?;

            match self.dispatch(&group, &event_state)? {
                Dispatch::Stop => {
                    info!("Propagation stopped by an event @ {epoch}");
                    self.state = event_state;
                    return Ok(self.state.clone());
                }
                Dispatch::Reset(new_state) => {
                    ensure!(
                        (new_state.epoch() - epoch).abs() <= 1 * Unit::Microsecond,
                        ResetEpochSnafu {
                            event: self.prop.detectors[group[0].index].to_string(),
                            expected: epoch,
                            got: new_state.epoch()
                        }
                    );
                    self.mapper = self.mapper.clone().with_drag_area(new_state.drag_area_m2);
                    y = DVector::zeros(self.mapper.layout().len());
                    self.mapper.map_state_to_array(&new_state, &mut y)?;
                }
                Dispatch::Continue => {
                    y = y_event;
                }
            }
            t = t_event;
            // The derivatives must be computed again at the event
            k0 = None;

            let state_now = self.mapper.decode(epoch, &y, false)?;
            self.reset_trackers(&mut trackers, t, &state_now, &group)?;
        }

        self.state = self
            .mapper
            .decode(self.mapper.map_double_to_date_expected(t, stop_time), &y, true)?;

        #[cfg(not(target_arch = "wasm32"))]
        {
            if log_progress {
                let tock: Duration = tick.elapsed().into();
                info!("Done in {}", tock);
            }
        }

        Ok(self.state.clone())
    }

    /// Propagates the provided Dynamics until the provided epoch. Returns the end state.
    pub fn until_epoch(&mut self, end_time: Epoch) -> Result<SpacecraftState, PropagationError> {
        let duration: Duration = end_time - self.state.epoch();
        self.for_duration(duration)
    }

    fn init_trackers(
        &self,
        t: f64,
        state: &SpacecraftState,
    ) -> Result<Vec<DetectorTracker>, PropagationError> {
        self.prop
            .detectors
            .iter()
            .map(|detector| {
                let g = detector.g(state).context(PropEventSnafu)?;
                // An event at the very start of the run is ignored
                Ok(DetectorTracker {
                    g,
                    positive: g >= 0.0,
                    last_event: Some(t),
                })
            })
            .collect()
    }

    fn reset_trackers(
        &self,
        trackers: &mut [DetectorTracker],
        t: f64,
        state: &SpacecraftState,
        fired: &[Candidate],
    ) -> Result<(), PropagationError> {
        for (index, (tracker, detector)) in trackers
            .iter_mut()
            .zip(self.prop.detectors.iter())
            .enumerate()
        {
            tracker.g = detector.g(state).context(PropEventSnafu)?;
            match fired.iter().find(|c| c.index == index) {
                Some(candidate) => {
                    // The sign after the event is the one of its direction
                    tracker.positive = candidate.increasing;
                    tracker.last_event = Some(t);
                }
                None => tracker.positive = tracker.g >= 0.0,
            }
        }
        Ok(())
    }

    /// Value of the switching function on the interpolated state
    fn g_at(
        &self,
        detector: &dyn EventDetector,
        interp: &StepInterpolant,
        t: f64,
    ) -> Result<f64, EventError> {
        let y = interp.at(t);
        let state = self
            .mapper
            .decode(self.mapper.map_double_to_date(t), &y, false)
            .map_err(|e| EventError::EvaluationFailed {
                event: detector.to_string(),
                msg: e.to_string(),
            })?;
        detector.g(&state)
    }

    /// Checks every detector over the step, returning the first event of each detector, or the value of its
    /// switching function at the end of the step if it has none.
    fn find_events(
        &self,
        trackers: &[DetectorTracker],
        interp: &StepInterpolant,
        forward: bool,
    ) -> Result<(Vec<Candidate>, Vec<Option<f64>>), PropagationError> {
        let mut candidates = Vec::new();
        let mut g_end = Vec::with_capacity(trackers.len());

        for (index, (detector, tracker)) in self.prop.detectors.iter().zip(trackers).enumerate() {
            let detector = detector.as_ref();
            let settings = detector.settings();
            let threshold_s = settings.threshold.to_seconds().abs();
            let max_check_s = settings.max_check.to_seconds().abs();
            let checks = ((interp.h.abs() / max_check_s).ceil() as usize).max(1);

            let (mut ta, mut ga, mut positive) = (interp.t_a, tracker.g, tracker.positive);
            let mut found = None;
            for i in 1..=checks {
                let tb = if i == checks {
                    interp.t_b
                } else {
                    interp.t_a + interp.h * (i as f64) / (checks as f64)
                };
                let gb = self.g_at(detector, interp, tb).context(PropEventSnafu)?;

                if (gb >= 0.0) != positive {
                    let bracket = Bracket {
                        xa: ta,
                        ya: ga,
                        xb: tb,
                        yb: gb,
                    };
                    // A forced sign without an actual sign change is not an event
                    if bracket.is_valid() {
                        let root = match brent(
                            |x| self.g_at(detector, interp, x),
                            bracket,
                            threshold_s,
                            settings.max_iterations,
                            forward,
                        )
                        .context(PropEventSnafu)?
                        {
                            RootSearch::Converged(root) => root,
                            RootSearch::NotConverged { iterations } => {
                                return Err(EventError::RootSearchNotConverged {
                                    event: detector.to_string(),
                                    iterations,
                                    start: self.mapper.map_double_to_date(ta),
                                    end: self.mapper.map_double_to_date(tb),
                                })
                                .context(PropEventSnafu)
                            }
                        };

                        let repeated = tracker
                            .last_event
                            .map(|last| (root - last).abs() <= threshold_s)
                            .unwrap_or(false);
                        if repeated {
                            debug!(
                                "{detector} root @ {} ignored, already handled",
                                self.mapper.map_double_to_date(root)
                            );
                        } else {
                            found = Some(Candidate {
                                t: root,
                                index,
                                increasing: !positive,
                                threshold_s,
                            });
                            break;
                        }
                    }
                }
                ta = tb;
                ga = gb;
                positive = gb >= 0.0;
            }

            match found {
                Some(candidate) => {
                    candidates.push(candidate);
                    g_end.push(None);
                }
                None => g_end.push(Some(ga)),
            }
        }

        Ok((candidates, g_end))
    }

    /// Calls the handlers of the simultaneous events in order of registration, until one stops or resets
    fn dispatch(
        &mut self,
        group: &[Candidate],
        state: &SpacecraftState,
    ) -> Result<Dispatch, PropagationError> {
        let prop = self.prop;
        for candidate in group {
            let detector = &prop.detectors[candidate.index];
            let action = detector
                .event_occurred(state, candidate.increasing)
                .context(PropEventSnafu)?;
            let occurrence = EventOccurrence {
                epoch: state.epoch(),
                detector: detector.to_string(),
                index: candidate.index,
                increasing: candidate.increasing,
                action: action.clone(),
            };
            debug!("{occurrence}");
            self.event_log.push(occurrence);

            match action {
                Action::Stop => return Ok(Dispatch::Stop),
                Action::ResetState(new_state) => return Ok(Dispatch::Reset(new_state)),
                Action::Continue | Action::ResetDerivatives => {}
            }
        }
        Ok(Dispatch::Continue)
    }

    /// Derivatives of the raw state vector at `t` seconds past the reference epoch
    fn derivatives(&self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>, PropagationError> {
        let layout = self.mapper.layout();
        let state = self
            .mapper
            .decode(self.mapper.map_double_to_date(t), y, false)?;
        let mut dy = DVector::zeros(y.len());

        let rates = if layout.with_jacobian {
            let (rates, grad, param_partials) = self
                .prop
                .dynamics
                .dual_eom(&state, &layout.parameters)
                .context(DynamicsSnafu)?;
            let cols = layout.jacobian_cols();
            let offset = layout.jacobian_offset();
            let phi = DMatrix::from_column_slice(6, cols, &y.as_slice()[offset..offset + 6 * cols]);
            // dPhi/dt = A Phi + [0 | df/dp]
            let mut phi_dot = grad * phi;
            for (col, partials) in param_partials.column_iter().enumerate() {
                for row in 0..6 {
                    phi_dot[(row, 6 + col)] += partials[row];
                }
            }
            for (i, value) in phi_dot.iter().enumerate() {
                dy[offset + i] = *value;
            }
            rates
        } else {
            self.prop.dynamics.eom(&state).context(DynamicsSnafu)?
        };

        ensure!(
            rates.additional.len() == layout.additional_len,
            StateLengthSnafu {
                expected: layout.additional_len,
                got: rates.additional.len()
            }
        );
        let orbit_rates = self.mapper.orbit_rates(&state.orbit, &rates.pos_vel)?;
        for i in 0..6 {
            dy[i] = orbit_rates[i];
        }
        dy[MASS_INDEX] = rates.mass_rate;
        let offset = layout.additional_offset();
        for (i, rate) in rates.additional.iter().enumerate() {
            dy[offset + i] = *rate;
        }
        Ok(dy)
    }

    /// This method integrates the raw state from `t`, where its derivatives are `f_a`. Everything passed to this
    /// function is in **seconds**.
    ///
    /// This function returns the step size used and the new state as y_{n+1} = y_n + \frac{dy_n}{dt}.
    /// To get the integration details, check `self.latest_details`.
    fn derive(
        &mut self,
        t: f64,
        state_vec: &DVector<f64>,
        f_a: &DVector<f64>,
        step: f64,
        fixed: bool,
    ) -> Result<(f64, DVector<f64>), PropagationError> {
        let prop = self.prop;
        // Reset the number of attempts used (we don't reset the error because it's set before it's read)
        self.details.attempts = 1;
        // The step size is in seconds, signed, and it may be reduced below
        let mut step_size = step;
        loop {
            self.k[0] = f_a.clone();
            let mut a_idx: usize = 0;
            for i in 0..(prop.stages - 1) {
                // Let's compute the c_i by summing the relevant items from the list of coefficients.
                // \sum_{j=1}^{i-1} a_ij  ∀ i ∈ [2, s]
                let mut ci: f64 = 0.0;
                // The wi stores the a_{s1} * k_1 + a_{s2} * k_2 + ... + a_{s, s-1} * k_{s-1} +
                let mut wi = DVector::<f64>::zeros(state_vec.len());
                for kj in &self.k[0..i + 1] {
                    let a_ij = prop.a_coeffs[a_idx];
                    ci += a_ij;
                    wi += a_ij * kj;
                    a_idx += 1;
                }

                let ki = self.derivatives(t + ci * step_size, &(state_vec + step_size * wi))?;
                self.k[i + 1] = ki;
            }
            // Compute the next state and the error
            let mut next_state = state_vec.clone();
            // State error estimation from https://en.wikipedia.org/wiki/Runge%E2%80%93Kutta_methods#Adaptive_Runge%E2%80%93Kutta_methods
            // This is consistent with GMAT https://github.com/ChristopherRabotin/GMAT/blob/37201a6290e7f7b941bc98ee973a527a5857104b/src/base/propagator/RungeKutta.cpp#L537
            let mut error_est = DVector::<f64>::zeros(state_vec.len());
            for (i, ki) in self.k.iter().enumerate() {
                let b_i = prop.b_coeffs[i];
                if !fixed {
                    let b_i_star = prop.b_coeffs[i + prop.stages];
                    error_est += step_size * (b_i - b_i_star) * ki;
                }
                next_state += step_size * b_i * ki;
            }

            self.details.step = step_size * Unit::Second;
            if fixed {
                // Using a fixed step, no adaptive step necessary
                return Ok((step_size, next_state));
            }

            let tolerance = prop.opts.tolerance;
            let min_step = prop.opts.min_step.to_seconds().abs();
            let max_step = prop.opts.max_step.to_seconds().abs();
            self.details.error = E::estimate(&error_est, &next_state, state_vec).max(
                jacobian_error::<E>(&error_est, &next_state, state_vec, self.mapper.layout()),
            );

            if self.details.error <= tolerance {
                // Error is less than tolerance, let's attempt to increase the step for the next iteration.
                let proposed_step = if self.details.error > 0.0 {
                    0.9 * step_size.abs()
                        * (tolerance / self.details.error).powf(1.0 / f64::from(prop.order))
                } else {
                    max_step
                };
                self.step_size = proposed_step.clamp(min_step, max_step) * Unit::Second;
                return Ok((step_size, next_state));
            }

            ensure!(
                step_size.abs() > min_step,
                StepUnderflowSnafu {
                    epoch: self.mapper.map_double_to_date(t),
                    step: step_size * Unit::Second,
                    error: self.details.error,
                    tolerance
                }
            );

            if self.details.attempts >= prop.opts.attempts {
                warn!(
                    "Could not further decrease step size: maximum number of attempts reached ({})",
                    self.details.attempts
                );
                self.step_size = step_size.abs() * Unit::Second;
                return Ok((step_size, next_state));
            }

            // Error is too high and we aren't using the smallest step, and we haven't hit the max number of attempts.
            // So let's adapt the step size.
            self.details.attempts += 1;
            let proposed_step = 0.9
                * step_size.abs()
                * (tolerance / self.details.error).powf(1.0 / f64::from(prop.order - 1));
            step_size = step_size.signum() * proposed_step.max(min_step);
        }
    }

    /// Copy the details of the latest integration step.
    pub fn latest_details(&self) -> IntegrationDetails {
        self.details
    }
}
