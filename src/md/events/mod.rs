/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

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

pub mod search;

mod detectors;
pub use detectors::*;

mod handlers;
pub use handlers::*;

use crate::cosmic::SpacecraftState;
use crate::errors::{ConfigError, EventError, InvalidConfigSnafu};
use crate::time::{Duration, Epoch, Unit};
use snafu::ensure;
use std::fmt;
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// A trait to specify how a specific event must be evaluated.
///
/// The switching function must be continuous and change sign exactly at the boundary of the phenomenon.
pub trait EventEvaluator: fmt::Display + Send + Sync {
    /// Evaluation of the event, must return a value corresponding to whether the state is before or after the event
    fn eval(&self, state: &SpacecraftState) -> Result<f64, EventError>;

    /// Returns a string representation of the event evaluation for the given state
    fn eval_string(&self, state: &SpacecraftState) -> Result<String, EventError> {
        Ok(format!("{self} = {:.6}", self.eval(state)?))
    }
}

/// The action to take after an event has occurred.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum Action {
    /// Propagation continues from the event
    Continue,
    /// Propagation ends successfully at the event
    Stop,
    /// Propagation restarts from the provided state, which must be at the event epoch
    ResetState(SpacecraftState),
    /// Propagation restarts from the event, with freshly computed derivatives
    ResetDerivatives,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Stop => write!(f, "stop"),
            Self::ResetState(state) => write!(f, "reset state to {}", state.orbit),
            Self::ResetDerivatives => write!(f, "reset derivatives"),
        }
    }
}

/// A handler is called with the state at the event time and the direction of the sign change of the switching
/// function, and decides on the action the propagator must take.
pub trait EventHandler: fmt::Debug + Send + Sync {
    fn event_occurred(
        &self,
        state: &SpacecraftState,
        increasing: bool,
    ) -> Result<Action, EventError>;
}

/// Search settings of a detector
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder)]
pub struct DetectorSettings {
    /// Maximum interval between two evaluations of the switching function, shorter events may be missed
    #[builder(default = 600.0 * Unit::Second)]
    pub max_check: Duration,
    /// Width of the bracket below which the root search has converged
    #[builder(default = 1.0 * Unit::Microsecond)]
    pub threshold: Duration,
    #[builder(default = 100)]
    pub max_iterations: usize,
}

impl DetectorSettings {
    /// Checks that the check interval and the threshold are strictly positive, and that the root search may iterate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.max_check > Duration::ZERO,
            InvalidConfigSnafu {
                msg: format!("max check interval must be positive, got {}", self.max_check)
            }
        );
        ensure!(
            self.threshold > Duration::ZERO,
            InvalidConfigSnafu {
                msg: format!("convergence threshold must be positive, got {}", self.threshold)
            }
        );
        ensure!(
            self.max_iterations > 0,
            InvalidConfigSnafu {
                msg: "root search needs at least one iteration".to_string()
            }
        );
        Ok(())
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// An event detector, as used by the propagator: a switching function, search settings and a handler.
///
/// Detectors do not store anything about a propagation, so the same detector may be shared across runs.
pub trait EventDetector: fmt::Display + Send + Sync {
    /// Value of the switching function
    fn g(&self, state: &SpacecraftState) -> Result<f64, EventError>;

    fn settings(&self) -> DetectorSettings;

    /// Called at the event time, `increasing` is true if the switching function goes from negative to positive
    fn event_occurred(
        &self,
        state: &SpacecraftState,
        increasing: bool,
    ) -> Result<Action, EventError>;
}

/// A detector built from a switching function, which stops the propagation by default.
#[derive(Clone)]
pub struct Detector<G: EventEvaluator> {
    pub evaluator: G,
    pub settings: DetectorSettings,
    pub handler: Arc<dyn EventHandler>,
}

impl<G: EventEvaluator> Detector<G> {
    /// Builds a detector with the default settings, stopping at the first occurrence of the event
    pub fn new(evaluator: G) -> Self {
        Self {
            evaluator,
            settings: DetectorSettings::default(),
            handler: Arc::new(StopOnEvent),
        }
    }

    /// Returns a copy of this detector with the provided search settings
    pub fn with_settings(&self, settings: DetectorSettings) -> Self
    where
        G: Clone,
    {
        let mut me = self.clone();
        me.settings = settings;
        me
    }

    pub fn with_max_check(&self, max_check: Duration) -> Self
    where
        G: Clone,
    {
        let mut me = self.clone();
        me.settings.max_check = max_check;
        me
    }

    pub fn with_threshold(&self, threshold: Duration) -> Self
    where
        G: Clone,
    {
        let mut me = self.clone();
        me.settings.threshold = threshold;
        me
    }

    pub fn with_max_iterations(&self, max_iterations: usize) -> Self
    where
        G: Clone,
    {
        let mut me = self.clone();
        me.settings.max_iterations = max_iterations;
        me
    }

    /// Returns a copy of this detector which reacts to the events with the provided handler
    pub fn with_handler(&self, handler: Arc<dyn EventHandler>) -> Self
    where
        G: Clone,
    {
        let mut me = self.clone();
        me.handler = handler;
        me
    }
}

impl<G: EventEvaluator> fmt::Display for Detector<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.evaluator)
    }
}

impl<G: EventEvaluator> EventDetector for Detector<G> {
    fn g(&self, state: &SpacecraftState) -> Result<f64, EventError> {
        self.evaluator.eval(state)
    }

    fn settings(&self) -> DetectorSettings {
        self.settings
    }

    fn event_occurred(
        &self,
        state: &SpacecraftState,
        increasing: bool,
    ) -> Result<Action, EventError> {
        if log_enabled!(log::Level::Debug) {
            debug!(
                "{} ({}) @ {}",
                self.evaluator.eval_string(state)?,
                if increasing { "increasing" } else { "decreasing" },
                state.epoch()
            );
        }
        self.handler.event_occurred(state, increasing)
    }
}

/// Record of an event which occurred during a propagation
#[derive(Clone, Debug, PartialEq)]
pub struct EventOccurrence {
    pub epoch: Epoch,
    /// Name of the detector
    pub detector: String,
    /// Index of the detector in the order of registration in the propagator
    pub index: usize,
    pub increasing: bool,
    pub action: Action,
}

impl fmt::Display for EventOccurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} ({}) @ {}: {}",
            self.detector,
            self.index,
            if self.increasing {
                "increasing"
            } else {
                "decreasing"
            },
            self.epoch,
            self.action
        )
    }
}
