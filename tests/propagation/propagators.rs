extern crate pretty_env_logger;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use crate::leo_state;
use nyx_od::cosmic::{AngleType, OrbitType, SpacecraftState};
use nyx_od::dynamics::{OrbitalDynamics, SpacecraftDynamics, J2};
use nyx_od::propagators::*;
use nyx_od::time::Unit;
use rstest::*;

fn two_body_dynamics() -> SpacecraftDynamics {
    SpacecraftDynamics::new(OrbitalDynamics::two_body())
}

#[fixture]
fn two_body() -> SpacecraftDynamics {
    two_body_dynamics()
}

#[fixture]
fn leo() -> SpacecraftState {
    leo_state()
}

#[rstest]
#[case::dp45(Propagator::dp45(two_body_dynamics(), PropOpts::default()))]
#[case::cash_karp45(Propagator::cash_karp45(two_body_dynamics(), PropOpts::default()))]
#[case::verner56(Propagator::verner56(two_body_dynamics(), PropOpts::default()))]
fn two_body_period_return(
    #[case] prop: Propagator<SpacecraftDynamics, RSSCartesianStep>,
    leo: SpacecraftState,
) {
    let _ = pretty_env_logger::try_init();

    let period = leo.orbit.period().unwrap();
    let end = prop.with(leo.clone()).unwrap().for_duration(period).unwrap();

    assert_eq!(end.epoch(), leo.epoch() + period);
    let (err_p, err_v, _) = end.rss(&leo);
    println!("{prop}: {:.3e} km, {:.3e} km/s", err_p, err_v);
    assert!(err_p < 1e-5, "position error {err_p} km");
    assert!(err_v < 1e-8, "velocity error {err_v} km/s");
}

#[rstest]
#[case::keplerian_true(OrbitType::Keplerian, AngleType::True)]
#[case::keplerian_mean(OrbitType::Keplerian, AngleType::Mean)]
#[case::circular_eccentric(OrbitType::Circular, AngleType::Eccentric)]
#[case::equinoctial_true(OrbitType::Equinoctial, AngleType::True)]
fn orbit_types_agree(#[case] orbit_type: OrbitType, #[case] angle_type: AngleType, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let dynamics = SpacecraftDynamics::new(OrbitalDynamics::from_model(J2::earth()));
    let cartesian = Propagator::default(dynamics.clone());
    let elements = Propagator::default(dynamics).with_orbit_type(orbit_type, angle_type);

    let duration = 3 * Unit::Hour;
    let reference = cartesian.with(leo.clone()).unwrap().for_duration(duration).unwrap();
    let end = elements.with(leo).unwrap().for_duration(duration).unwrap();

    let (err_p, err_v, _) = end.rss(&reference);
    println!("{orbit_type} ({angle_type}): {:.3e} km, {:.3e} km/s", err_p, err_v);
    assert!(err_p < 1e-4, "position error {err_p} km");
    assert!(err_v < 1e-7, "velocity error {err_v} km/s");
}

#[rstest]
fn backward_returns_to_start(leo: SpacecraftState, two_body: SpacecraftDynamics) {
    let _ = pretty_env_logger::try_init();

    let prop = Propagator::default(two_body);
    let mut instance = prop.with(leo.clone()).unwrap();
    let later = instance.for_duration(2 * Unit::Hour).unwrap();
    assert_eq!(later.epoch(), leo.epoch() + 2 * Unit::Hour);

    let back = instance.until_epoch(leo.epoch()).unwrap();
    assert_eq!(back.epoch(), leo.epoch());
    let (err_p, err_v, _) = back.rss(&leo);
    assert!(err_p < 1e-6 && err_v < 1e-9, "{err_p} km, {err_v} km/s");

    // A null duration returns the current state
    let same = instance.for_duration(0 * Unit::Second).unwrap();
    assert_eq!(same, back);
}

#[rstest]
fn fixed_step_lands_on_target(leo: SpacecraftState, two_body: SpacecraftDynamics) {
    let prop = Propagator::new::<Verner56>(two_body, PropOpts::with_fixed_step(7 * Unit::Second));
    let duration = 100 * Unit::Second + 250 * Unit::Millisecond;
    let end = prop.with(leo.clone()).unwrap().for_duration(duration).unwrap();
    assert_eq!(end.epoch(), leo.epoch() + duration);
}

#[rstest]
fn step_underflow(leo: SpacecraftState, two_body: SpacecraftDynamics) {
    let _ = pretty_env_logger::try_init();

    let opts = PropOpts::with_adaptive_step(10 * Unit::Second, 60 * Unit::Second, 1e-30, RSSCartesianStep);
    let prop = Propagator::dp45(two_body, opts);
    let err = prop.with(leo).unwrap().for_duration(1 * Unit::Hour).unwrap_err();
    assert!(
        matches!(err, PropagationError::StepUnderflow { .. }),
        "expected a step underflow, got {err}"
    );
}

#[rstest]
fn missing_gravitational_parameter(leo: SpacecraftState, two_body: SpacecraftDynamics) {
    let mut leo = leo;
    leo.orbit.frame.mu_km3_s2 = None;
    let prop = Propagator::default(two_body).with_orbit_type(OrbitType::Keplerian, AngleType::True);
    assert!(prop.with(leo).is_err());
}

#[rstest]
fn two_body_conserves_energy(leo: SpacecraftState, two_body: SpacecraftDynamics) {
    let prop = Propagator::dp45(two_body, PropOpts::with_tolerance(1e-13));
    let end = prop.with(leo.clone()).unwrap().for_duration(12 * Unit::Hour).unwrap();
    assert_relative_eq!(
        end.orbit.energy_km2_s2().unwrap(),
        leo.orbit.energy_km2_s2().unwrap(),
        max_relative = 1e-9
    );
    assert_abs_diff_eq!(end.orbit.inc_deg(), leo.orbit.inc_deg(), epsilon = 1e-8);
}

#[rstest]
fn invalid_options(leo: SpacecraftState, two_body: SpacecraftDynamics) {
    let opts = PropOpts::with_adaptive_step(60 * Unit::Second, 10 * Unit::Second, 1e-12, RSSCartesianStep);
    let prop = Propagator::new::<Dormand45>(two_body, opts);
    assert!(matches!(
        prop.with(leo),
        Err(PropagationError::PropConfigError { .. })
    ));
}
