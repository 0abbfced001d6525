mod blse;
mod config;

use crate::test_epoch;
use nyx_od::cosmic::{AngleType, Orbit, OrbitType, SpacecraftState, EARTH_J2000};
use nyx_od::dynamics::{OrbitalDynamics, SpacecraftDynamics};
use nyx_od::linalg::Vector3;
use nyx_od::od::simulator::{Generator, MeasurementBuilder, PVBuilder};
use nyx_od::od::{Measurement, PropagatorBuilder};
use nyx_od::propagators::{Dormand45, PropOpts, Propagator, RSSCartesianStep};
use nyx_od::time::{Duration, Unit};
use std::sync::Arc;

pub fn two_body() -> SpacecraftDynamics {
    SpacecraftDynamics::new(OrbitalDynamics::two_body())
}

/// Noiseless measurements of the builders, sampled from the truth on a fixed cadence
pub fn simulate(
    truth: &SpacecraftState,
    duration: Duration,
    step: Duration,
    builders: Vec<Arc<dyn MeasurementBuilder>>,
) -> Vec<Measurement> {
    let prop = Propagator::default(two_body());
    let mut generator = Generator::builder()
        .start(truth.epoch())
        .end(truth.epoch() + duration)
        .step(step)
        .build();
    for builder in builders {
        generator.add_builder(builder);
    }
    generator.generate(&[(&prop, truth.clone())], None).unwrap()
}

pub fn pv_measurements(truth: &SpacecraftState) -> Vec<Measurement> {
    simulate(
        truth,
        2 * Unit::Hour,
        5 * Unit::Minute,
        vec![Arc::new(PVBuilder {
            sigma_position_km: 1e-3,
            sigma_velocity_km_s: 1e-6,
            base_weight: 1.0,
            propagator: 0,
        })],
    )
}

/// The truth with an error of a few hundred meters and a few decimeters per second
pub fn initial_guess(truth: &SpacecraftState) -> SpacecraftState {
    let orbit = Orbit::from_position_velocity(
        truth.orbit.radius_km + Vector3::new(0.5, -0.3, 0.2),
        truth.orbit.velocity_km_s + Vector3::new(-4e-4, 3e-4, 2e-4),
        truth.epoch(),
        EARTH_J2000,
    );
    truth.clone().with_orbit(orbit)
}

pub fn arc_builder(
    guess: SpacecraftState,
    orbit_type: OrbitType,
    angle_type: AngleType,
) -> PropagatorBuilder<RSSCartesianStep> {
    PropagatorBuilder::new::<Dormand45>(
        guess,
        two_body(),
        PropOpts::default(),
        orbit_type,
        angle_type,
        0.1,
    )
    .unwrap()
}

/// A medium Earth orbit, visible for hours from the ground
pub fn meo_state() -> SpacecraftState {
    let orbit =
        Orbit::keplerian(20_000.0, 0.01, 50.0, 40.0, 50.0, 60.0, test_epoch(), EARTH_J2000).unwrap();
    SpacecraftState::new(orbit, 500.0)
}
