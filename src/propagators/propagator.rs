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

use super::error_ctrl::{ErrorCtrl, RSSCartesianStep};
use super::{
    CashKarp45, Dormand45, IntegrationDetails, PropConfigSnafu, PropInstance, PropOpts, PropagationError,
    StateLayout, StateMapper, Verner56, RK,
};
use crate::cosmic::{AngleType, AttitudeProvider, InertialAttitude, OrbitType, SpacecraftState};
use crate::dynamics::Dynamics;
use crate::linalg::{DMatrix, DVector};
use crate::md::events::EventDetector;
use crate::time::Duration;
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;

/// A Propagator allows propagating a set of dynamics forward or backward in time.
///
/// It stores the dynamics, the integration options, the coefficients of the integrator, the representation of
/// the orbit in the integrated vector, and the event detectors checked after every step. The same propagator
/// may be used to create any number of instances, each with its own state.
#[derive(Clone)]
pub struct Propagator<D: Dynamics, E: ErrorCtrl> {
    pub dynamics: D, // Stores the dynamics used. *Must* use this to get the latest values
    pub opts: PropOpts<E>, // Stores the integration options (tolerance, min/max step, init step, etc.)
    pub orbit_type: OrbitType,
    pub angle_type: AngleType,
    pub attitude: Arc<dyn AttitudeProvider>,
    /// Detectors in order of registration, which is the order used to break ties between simultaneous events
    pub detectors: Vec<Arc<dyn EventDetector>>,
    /// Names of the parameters of the Jacobian, which is only propagated when this is set
    pub sensitivity: Option<Vec<String>>,
    pub(crate) order: u8, // Order of the integrator
    pub(crate) stages: usize, // Number of stages, i.e. how many times the derivatives will be called
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
}

impl<D: Dynamics, E: ErrorCtrl> Propagator<D, E> {
    /// Each propagator must be initialized with `new` which stores propagator information.
    ///
    /// By default, the orbit is integrated in Cartesian coordinates, with an inertial attitude and no detector.
    pub fn new<T: RK>(dynamics: D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            orbit_type: OrbitType::Cartesian,
            angle_type: AngleType::True,
            attitude: Arc::new(InertialAttitude::default()),
            detectors: Vec::new(),
            sensitivity: None,
            stages: T::STAGES,
            order: T::ORDER,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
        }
    }

    /// A Dormand Prince 4-5 propagator with custom propagator options.
    pub fn dp45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<Dormand45>(dynamics, opts)
    }

    /// A Cash Karp 4-5 propagator with custom propagator options.
    pub fn cash_karp45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<CashKarp45>(dynamics, opts)
    }

    /// A Verner 5-6 propagator with custom propagator options.
    pub fn verner56(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<Verner56>(dynamics, opts)
    }

    /// Integrate the orbit in the provided elements instead of the Cartesian state
    pub fn with_orbit_type(mut self, orbit_type: OrbitType, angle_type: AngleType) -> Self {
        self.orbit_type = orbit_type;
        self.angle_type = angle_type;
        self
    }

    pub fn with_attitude(mut self, attitude: Arc<dyn AttitudeProvider>) -> Self {
        self.attitude = attitude;
        self
    }

    /// Registers a detector, after all of the previously registered ones
    pub fn with_event_detector(mut self, detector: Arc<dyn EventDetector>) -> Self {
        self.add_event_detector(detector);
        self
    }

    pub fn add_event_detector(&mut self, detector: Arc<dyn EventDetector>) {
        self.detectors.push(detector);
    }

    pub fn clear_event_detectors(&mut self) {
        self.detectors.clear();
    }

    /// Propagates the Jacobian of the Cartesian state with respect to the initial elements and the named parameters
    pub fn with_sensitivity(mut self, parameters: Vec<String>) -> Self {
        self.sensitivity = Some(parameters);
        self
    }

    /// Set the tolerance for the propagator
    pub fn set_tolerance(&mut self, tol: f64) {
        self.opts.tolerance = tol;
    }

    /// Set the maximum step size for the propagator and sets the initial step to that value if currently greater
    pub fn set_max_step(&mut self, step: Duration) {
        self.opts.set_max_step(step);
    }

    pub fn set_min_step(&mut self, step: Duration) {
        self.opts.set_min_step(step);
    }

    /// Layout of the vectors integrated by this propagator
    pub fn layout(&self) -> StateLayout {
        let additional_len = self.dynamics.additional_dimension();
        match &self.sensitivity {
            Some(parameters) => StateLayout::with_jacobian(additional_len, parameters.clone()),
            None => StateLayout::new(additional_len),
        }
    }

    /// Creates an instance of this propagator from the provided initial state.
    ///
    /// This fails if the integration options or the settings of a detector are invalid, if the state cannot be
    /// represented in the configured orbit type, if its frame has no gravitational parameter, or if its Jacobian
    /// does not match the sensitivity parameters.
    pub fn with(&self, state: SpacecraftState) -> Result<PropInstance<'_, D, E>, PropagationError> {
        self.opts.validate().context(PropConfigSnafu)?;
        for detector in &self.detectors {
            if let Err(e) = detector.settings().validate() {
                error!("{detector}: {e}");
                return Err(e).context(PropConfigSnafu);
            }
        }
        let layout = self.layout();
        let mapper = StateMapper::new(
            state.epoch(),
            state.orbit.frame,
            self.orbit_type,
            self.angle_type,
            self.attitude.clone(),
            layout.clone(),
        )?
        .with_drag_area(state.drag_area_m2);

        // Check that the initial state can be encoded
        let mut y = DVector::zeros(layout.len());
        mapper.map_state_to_array(&state, &mut y)?;

        let mut state = state;
        if layout.with_jacobian && state.jacobian.is_none() {
            let mut jacobian = DMatrix::zeros(6, layout.jacobian_cols());
            jacobian
                .view_mut((0, 0), (6, 6))
                .copy_from(&mapper.initial_jacobian(&state.orbit)?);
            state.jacobian = Some(jacobian);
        }

        // Pre-allocate the k used in the propagator
        let k = vec![DVector::zeros(layout.len()); self.stages];
        Ok(PropInstance {
            state,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            mapper,
            step_size: self.opts.init_step.abs(),
            fixed_step: self.opts.fixed_step,
            k,
            event_log: Vec::new(),
        })
    }
}

impl<D: Dynamics> Propagator<D, RSSCartesianStep> {
    /// Default propagator is a Dormand Prince 4-5 with the default PropOpts.
    pub fn default(dynamics: D) -> Self {
        Self::new::<Dormand45>(dynamics, PropOpts::default())
    }
}

impl<D: Dynamics, E: ErrorCtrl> fmt::Display for Propagator<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RK{} ({} stages) in {} elements ({} angle), {}, {} detector(s)",
            self.order,
            self.stages,
            self.orbit_type,
            self.angle_type,
            self.opts,
            self.detectors.len()
        )?;
        if let Some(parameters) = &self.sensitivity {
            write!(f, ", sensitivity to {parameters:?}")?;
        }
        Ok(())
    }
}
