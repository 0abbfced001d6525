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

use crate::linalg::DVector;
use crate::md::ParameterDriver;
use std::fmt;

/// Drivers of one propagation arc: its six orbital parameters and the parameters of its dynamics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArcDrivers {
    pub orbital: Vec<ParameterDriver>,
    pub propagation: Vec<ParameterDriver>,
}

/// The ordered set of all the parameters of an estimation.
///
/// The order is: for each arc its orbital drivers then its propagation drivers, then the measurement drivers.
/// Only the drivers flagged as estimated are part of the normalized parameter vector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EstimationParameterSet {
    pub arcs: Vec<ArcDrivers>,
    pub measurements: Vec<ParameterDriver>,
}

impl EstimationParameterSet {
    pub fn new(arcs: Vec<ArcDrivers>) -> Self {
        Self {
            arcs,
            measurements: Vec::new(),
        }
    }

    /// Adds a measurement driver, unless a driver with the same name was already added
    pub fn add_measurement_driver(&mut self, driver: ParameterDriver) {
        if !self.measurements.iter().any(|d| d.name == driver.name) {
            self.measurements.push(driver);
        }
    }

    /// Iterates over all the drivers, in order
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDriver> {
        self.arcs
            .iter()
            .flat_map(|arc| arc.orbital.iter().chain(arc.propagation.iter()))
            .chain(self.measurements.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParameterDriver> {
        self.arcs
            .iter_mut()
            .flat_map(|arc| arc.orbital.iter_mut().chain(arc.propagation.iter_mut()))
            .chain(self.measurements.iter_mut())
    }

    /// Iterates over the estimated drivers, in order
    pub fn estimated(&self) -> impl Iterator<Item = &ParameterDriver> {
        self.iter().filter(|d| d.estimated)
    }

    /// Number of estimated parameters
    pub fn estimated_count(&self) -> usize {
        self.estimated().count()
    }

    /// Index in the normalized parameter vector of the estimated orbital driver `i` of the arc `arc`
    pub fn orbital_index(&self, arc: usize, i: usize) -> Option<usize> {
        let driver = self.arcs.get(arc)?.orbital.get(i)?;
        if !driver.estimated {
            return None;
        }
        Some(self.index_before(arc) + self.arcs[arc].orbital[..i].iter().filter(|d| d.estimated).count())
    }

    /// Index in the normalized parameter vector of the estimated propagation driver `name` of the arc `arc`
    pub fn propagation_index(&self, arc: usize, name: &str) -> Option<usize> {
        let drivers = self.arcs.get(arc)?;
        let pos = drivers
            .propagation
            .iter()
            .position(|d| d.estimated && d.name == name)?;
        Some(
            self.index_before(arc)
                + drivers.orbital.iter().filter(|d| d.estimated).count()
                + drivers.propagation[..pos].iter().filter(|d| d.estimated).count(),
        )
    }

    /// Index in the normalized parameter vector of the estimated measurement driver `name`
    pub fn measurement_index(&self, name: &str) -> Option<usize> {
        let pos = self
            .measurements
            .iter()
            .position(|d| d.estimated && d.name == name)?;
        Some(
            self.index_before(self.arcs.len())
                + self.measurements[..pos].iter().filter(|d| d.estimated).count(),
        )
    }

    /// Number of estimated drivers in the arcs before `arc`
    fn index_before(&self, arc: usize) -> usize {
        self.arcs[..arc]
            .iter()
            .flat_map(|a| a.orbital.iter().chain(a.propagation.iter()))
            .filter(|d| d.estimated)
            .count()
    }

    /// Normalized values of the estimated drivers
    pub fn normalized(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.estimated_count(),
            self.estimated().map(|d| d.normalized_value()),
        )
    }

    /// Scales of the estimated drivers
    pub fn scales(&self) -> DVector<f64> {
        DVector::from_iterator(self.estimated_count(), self.estimated().map(|d| d.scale))
    }

    /// Adds the normalized update to the estimated drivers, clipping each to its bounds.
    ///
    /// Returns the number of clipped drivers.
    pub fn apply_normalized_update(&mut self, delta: &DVector<f64>) -> usize {
        let mut clipped = 0;
        for (driver, delta) in self.iter_mut().filter(|d| d.estimated).zip(delta.iter()) {
            let normalized = driver.normalized_value() + delta;
            if driver.set_normalized_value(normalized) {
                clipped += 1;
            }
        }
        clipped
    }
}

impl fmt::Display for EstimationParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            writeln!(f, "arc #{i}")?;
            for driver in arc.orbital.iter().chain(arc.propagation.iter()) {
                writeln!(f, "\t{driver}")?;
            }
        }
        if !self.measurements.is_empty() {
            writeln!(f, "measurements")?;
            for driver in &self.measurements {
                writeln!(f, "\t{driver}")?;
            }
        }
        Ok(())
    }
}
