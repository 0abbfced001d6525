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

use crate::cosmic::AstroError;
use crate::time::Epoch;
use snafu::prelude::*;

/// Errors raised when building or loading a configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file: {source}"))]
    ReadError { source: std::io::Error },
    #[snafu(display("failed to parse YAML configuration: {source}"))]
    ParseError { source: serde_yaml::Error },
    #[snafu(display("invalid configuration: {msg}"))]
    InvalidConfig { msg: String },
    #[snafu(display("configuration issue with the frame: {source}"))]
    ConfigAstro { source: AstroError },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

/// Errors raised while evaluating or locating an event.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EventError {
    #[snafu(display(
        "root search of {event} did not converge in {iterations} iterations between {start} and {end}"
    ))]
    RootSearchNotConverged {
        event: String,
        iterations: usize,
        start: Epoch,
        end: Epoch,
    },
    #[snafu(display("{event} could not be evaluated: {source}"))]
    EventAstro { event: String, source: AstroError },
    #[snafu(display("{event} could not be evaluated: {msg}"))]
    EvaluationFailed { event: String, msg: String },
    #[snafu(display("handler of {event} failed: {msg}"))]
    HandlerFailed { event: String, msg: String },
}
