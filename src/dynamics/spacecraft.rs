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

use super::{
    AdditionalEquations, Dynamics, DynamicsError, ForceModel, OrbitalDynamics, StateRates,
    UnknownParameterSnafu,
};
use crate::cosmic::SpacecraftState;
use crate::linalg::{DMatrix, Matrix6};
use crate::md::ParameterDriver;
use snafu::ensure;
use std::fmt;
use std::sync::Arc;

/// A generic spacecraft dynamics: the orbital dynamics, the force models (divided by the spacecraft mass)
/// and the equations of the additional parameters.
#[derive(Clone)]
pub struct SpacecraftDynamics {
    pub orbital_dyn: OrbitalDynamics,
    pub force_models: Vec<Arc<dyn ForceModel>>,
    pub additional_equations: Vec<Arc<dyn AdditionalEquations>>,
}

impl SpacecraftDynamics {
    /// Initialize a Spacecraft with a set of orbital dynamics and no force model.
    pub fn new(orbital_dyn: OrbitalDynamics) -> Self {
        Self {
            orbital_dyn,
            force_models: Vec::new(),
            additional_equations: Vec::new(),
        }
    }

    /// Initialize a Spacecraft with a set of orbital dynamics and a single force model.
    pub fn from_model(orbital_dyn: OrbitalDynamics, force_model: Arc<dyn ForceModel>) -> Self {
        Self::from_models(orbital_dyn, vec![force_model])
    }

    /// Initialize a Spacecraft with a set of orbital dynamics and a set of force models.
    pub fn from_models(
        orbital_dyn: OrbitalDynamics,
        force_models: Vec<Arc<dyn ForceModel>>,
    ) -> Self {
        Self {
            orbital_dyn,
            force_models,
            additional_equations: Vec::new(),
        }
    }

    /// Add a model to the currently defined spacecraft dynamics
    pub fn add_model(&mut self, force_model: Arc<dyn ForceModel>) {
        self.force_models.push(force_model);
    }

    /// Add equations for additional parameters, whose values are stored after those of the previously added equations
    pub fn with_additional_equations(mut self, equations: Arc<dyn AdditionalEquations>) -> Self {
        self.additional_equations.push(equations);
        self
    }

    /// Returns a copy of these dynamics where each force model uses the value of the matching drivers.
    pub fn configured(&self, drivers: &[ParameterDriver]) -> Self {
        Self {
            orbital_dyn: self.orbital_dyn.clone(),
            force_models: self
                .force_models
                .iter()
                .map(|model| model.configured(drivers))
                .collect(),
            additional_equations: self.additional_equations.clone(),
        }
    }

    fn additional_rates(&self, state: &SpacecraftState) -> Result<Vec<f64>, DynamicsError> {
        let expected = self.additional_dimension();
        ensure!(
            state.additional.len() == expected,
            super::AdditionalDimensionSnafu {
                name: "all".to_string(),
                expected,
                got: state.additional.len()
            }
        );
        let mut rates = Vec::with_capacity(expected);
        let mut offset = 0;
        for eqs in &self.additional_equations {
            let dim = eqs.dimension();
            let these = eqs.derivatives(state, &state.additional[offset..offset + dim])?;
            ensure!(
                these.len() == dim,
                super::AdditionalDimensionSnafu {
                    name: eqs.name().to_string(),
                    expected: dim,
                    got: these.len()
                }
            );
            rates.extend(these);
            offset += dim;
        }
        Ok(rates)
    }
}

impl fmt::Display for SpacecraftDynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let force_models: String = if self.force_models.is_empty() {
            "No force models;".to_string()
        } else {
            self.force_models
                .iter()
                .map(|x| format!("{x}; "))
                .collect::<String>()
        };
        write!(f, "Spacecraft dynamics: {force_models} {}", self.orbital_dyn)
    }
}

impl Dynamics for SpacecraftDynamics {
    fn eom(&self, state: &SpacecraftState) -> Result<StateRates, DynamicsError> {
        let mut pos_vel = self.orbital_dyn.eom(&state.orbit)?;
        for model in &self.force_models {
            let acc = model.eom(state)?;
            for i in 0..3 {
                pos_vel[i + 3] += acc[i];
            }
        }

        Ok(StateRates {
            pos_vel,
            mass_rate: 0.0,
            additional: self.additional_rates(state)?,
        })
    }

    fn dual_eom(
        &self,
        state: &SpacecraftState,
        parameters: &[String],
    ) -> Result<(StateRates, Matrix6<f64>, DMatrix<f64>), DynamicsError> {
        let (mut pos_vel, mut grad) = self.orbital_dyn.dual_eom(&state.orbit)?;
        for model in &self.force_models {
            let (acc, model_grad) = model.dual_eom(state)?;
            for i in 0..3 {
                pos_vel[i + 3] += acc[i];
                for j in 0..6 {
                    grad[(i + 3, j)] += model_grad[(i, j)];
                }
            }
        }

        let mut param_partials = DMatrix::zeros(6, parameters.len());
        for (col, name) in parameters.iter().enumerate() {
            let mut found = false;
            for model in &self.force_models {
                if let Some(partial) = model.parameter_partial(state, name)? {
                    found = true;
                    for i in 0..3 {
                        param_partials[(i + 3, col)] += partial[i];
                    }
                }
            }
            ensure!(found, UnknownParameterSnafu { name: name.clone() });
        }

        Ok((
            StateRates {
                pos_vel,
                mass_rate: 0.0,
                additional: self.additional_rates(state)?,
            },
            grad,
            param_partials,
        ))
    }

    fn additional_dimension(&self) -> usize {
        self.additional_equations.iter().map(|eq| eq.dimension()).sum()
    }

    fn parameter_drivers(&self) -> Vec<ParameterDriver> {
        self.force_models
            .iter()
            .flat_map(|model| model.parameter_drivers())
            .collect()
    }
}
