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

use super::MeasurementBuilder;
use crate::cosmic::SpacecraftState;
use crate::dynamics::Dynamics;
use crate::od::msr::{Measurement, MeasurementError, SimulationPropagationSnafu};
use crate::propagators::{ErrorCtrl, Propagator};
use crate::time::{Duration, Epoch, TimeSeries};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use snafu::ResultExt;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use typed_builder::TypedBuilder;

/// Generates measurements on a fixed cadence from the propagation of one or more spacecraft.
///
/// At each epoch of the time series, all the spacecraft are propagated, and each builder is given the states of all
/// propagators, indexed by their position in the arcs provided to [Generator::generate].
#[derive(Clone, TypedBuilder)]
pub struct Generator {
    pub start: Epoch,
    /// Inclusive
    pub end: Epoch,
    pub step: Duration,
    #[builder(default)]
    pub builders: Vec<Arc<dyn MeasurementBuilder>>,
}

impl Generator {
    pub fn add_builder(&mut self, builder: Arc<dyn MeasurementBuilder>) {
        self.builders.push(builder);
    }

    pub fn with_builder(mut self, builder: Arc<dyn MeasurementBuilder>) -> Self {
        self.add_builder(builder);
        self
    }

    /// Generates the measurements of all builders, in chronological order then in the order of the builders.
    ///
    /// Noise is only added if a seed is provided, and the same seed always generates the same measurements.
    pub fn generate<D: Dynamics, E: ErrorCtrl>(
        &self,
        arcs: &[(&Propagator<D, E>, SpacecraftState)],
        seed: Option<u64>,
    ) -> Result<Vec<Measurement>, MeasurementError> {
        let start = Instant::now();
        let mut rng = seed.map(Pcg64Mcg::seed_from_u64);

        let mut instances = arcs
            .iter()
            .map(|(prop, state)| prop.with(state.clone()))
            .collect::<Result<Vec<_>, _>>()
            .context(SimulationPropagationSnafu)?;

        let mut measurements = Vec::new();
        for epoch in TimeSeries::inclusive(self.start, self.end, self.step) {
            let states = instances
                .iter_mut()
                .map(|instance| instance.until_epoch(epoch))
                .collect::<Result<Vec<_>, _>>()
                .context(SimulationPropagationSnafu)?;

            for builder in &self.builders {
                if builder.is_visible(&states)? {
                    measurements.push(builder.build(&states, rng.as_mut())?);
                }
            }
        }

        info!(
            "Generated {} measurements in {:?}",
            measurements.len(),
            start.elapsed()
        );

        Ok(measurements)
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generator from {} to {} every {} with {} builder(s)",
            self.start,
            self.end,
            self.step,
            self.builders.len()
        )
    }
}
