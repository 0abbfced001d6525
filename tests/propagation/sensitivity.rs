extern crate pretty_env_logger;

use crate::test_epoch;
use nyx_od::cosmic::{AngleType, Orbit, OrbitType, SpacecraftState, EARTH_J2000};
use nyx_od::dynamics::{
    Drag, Dynamics, ExponentialAtmosphere, OrbitalDynamics, SpacecraftDynamics, DRAG_COEFFICIENT,
};
use nyx_od::linalg::{Matrix6, Vector6};
use nyx_od::propagators::*;
use nyx_od::time::{Duration, Unit};
use rstest::*;

// Compares the Jacobian propagated with the hyperdual partials of the dynamics against central finite differences.

#[fixture]
fn low_orbit() -> SpacecraftState {
    let orbit = Orbit::keplerian(6778.0, 0.001, 51.6, 10.0, 20.0, 30.0, test_epoch(), EARTH_J2000).unwrap();
    SpacecraftState::new(orbit, 100.0).with_drag_area(10.0)
}

fn drag_dynamics(cd: f64) -> SpacecraftDynamics {
    SpacecraftDynamics::from_model(
        OrbitalDynamics::two_body(),
        Drag::new(ExponentialAtmosphere::earth_400km(), cd).unwrap(),
    )
}

fn propagate(
    dynamics: SpacecraftDynamics,
    state: SpacecraftState,
    duration: Duration,
) -> Vector6<f64> {
    Propagator::default(dynamics)
        .with(state)
        .unwrap()
        .for_duration(duration)
        .unwrap()
        .orbit
        .to_cartesian_pos_vel()
}

#[rstest]
fn cartesian_stm_matches_finite_differences(low_orbit: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let duration = 30 * Unit::Minute;
    let prop = Propagator::default(drag_dynamics(2.2)).with_sensitivity(Vec::new());
    let end = prop.with(low_orbit.clone()).unwrap().for_duration(duration).unwrap();
    let jacobian = end.jacobian.clone().unwrap();
    assert_eq!(jacobian.shape(), (6, 6));

    let x0 = low_orbit.orbit.to_cartesian_pos_vel();
    let mut fd = Matrix6::zeros();
    for j in 0..6 {
        let h = if j < 3 { 1e-3 } else { 1e-6 };
        let mut plus = x0;
        plus[j] += h;
        let mut minus = x0;
        minus[j] -= h;
        let state_at = |x: Vector6<f64>| {
            low_orbit
                .clone()
                .with_orbit(Orbit::from_cartesian_pos_vel(&x, low_orbit.epoch(), EARTH_J2000))
        };
        let column = (propagate(drag_dynamics(2.2), state_at(plus), duration)
            - propagate(drag_dynamics(2.2), state_at(minus), duration))
            / (2.0 * h);
        fd.set_column(j, &column);
    }

    for j in 0..6 {
        let scale = fd.column(j).amax();
        for i in 0..6 {
            let err = (jacobian[(i, j)] - fd[(i, j)]).abs();
            assert!(
                err <= 1e-4 * scale,
                "∂x{i}/∂x0{j}: {} vs {}",
                jacobian[(i, j)],
                fd[(i, j)]
            );
        }
    }
}

#[rstest]
fn drag_coefficient_column(low_orbit: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let duration = 1 * Unit::Hour;
    let dynamics = drag_dynamics(2.2);
    assert_eq!(dynamics.parameter_drivers()[0].name, DRAG_COEFFICIENT);

    let prop = Propagator::default(dynamics).with_sensitivity(vec![DRAG_COEFFICIENT.to_string()]);
    let end = prop.with(low_orbit.clone()).unwrap().for_duration(duration).unwrap();
    let jacobian = end.jacobian.clone().unwrap();
    assert_eq!(jacobian.shape(), (6, 7));

    let dcd = 0.01;
    let fd = (propagate(drag_dynamics(2.2 + dcd), low_orbit.clone(), duration)
        - propagate(drag_dynamics(2.2 - dcd), low_orbit, duration))
        / (2.0 * dcd);

    println!("propagated: {}", jacobian.column(6));
    println!("finite differences: {fd}");
    for i in 0..6 {
        let err = (jacobian[(i, 6)] - fd[i]).abs();
        assert!(err <= 1e-3 * fd.amax(), "row {i}: {} vs {}", jacobian[(i, 6)], fd[i]);
    }
}

#[rstest]
#[case::keplerian(OrbitType::Keplerian, AngleType::Mean)]
#[case::equinoctial(OrbitType::Equinoctial, AngleType::True)]
#[case::circular(OrbitType::Circular, AngleType::Eccentric)]
fn element_jacobian_matches_finite_differences(
    #[case] orbit_type: OrbitType,
    #[case] angle_type: AngleType,
    low_orbit: SpacecraftState,
) {
    let _ = pretty_env_logger::try_init();

    let duration = 20 * Unit::Minute;
    let dynamics = SpacecraftDynamics::new(OrbitalDynamics::two_body());
    let prop = Propagator::default(dynamics.clone())
        .with_orbit_type(orbit_type, angle_type)
        .with_sensitivity(Vec::new());
    let end = prop.with(low_orbit.clone()).unwrap().for_duration(duration).unwrap();
    let jacobian = end.jacobian.clone().unwrap();

    // Column of the semi-major axis
    let elements = low_orbit.orbit.to_elements(orbit_type, angle_type).unwrap();
    let dsma = 1e-3;
    let state_with_sma = |sma: f64| {
        let mut perturbed = elements;
        perturbed[0] = sma;
        let orbit =
            Orbit::from_elements(&perturbed, orbit_type, angle_type, low_orbit.epoch(), EARTH_J2000)
                .unwrap();
        low_orbit.clone().with_orbit(orbit)
    };
    let fd = (propagate(dynamics.clone(), state_with_sma(elements[0] + dsma), duration)
        - propagate(dynamics, state_with_sma(elements[0] - dsma), duration))
        / (2.0 * dsma);

    for i in 0..6 {
        let err = (jacobian[(i, 0)] - fd[i]).abs();
        assert!(err <= 1e-4 * fd.amax(), "row {i}: {} vs {}", jacobian[(i, 0)], fd[i]);
    }
}
