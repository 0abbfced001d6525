extern crate pretty_env_logger;

use super::*;
use crate::leo_state;
use nyx_od::dynamics::{Drag, ExponentialAtmosphere, DRAG_COEFFICIENT};
use nyx_od::md::events::DateDetector;
use nyx_od::md::ParameterDriver;
use nyx_od::propagators::PropagationError;
use nyx_od::od::prelude::*;
use rstest::*;

#[rstest]
#[case::cartesian(OrbitType::Cartesian, AngleType::True)]
#[case::keplerian(OrbitType::Keplerian, AngleType::True)]
#[case::equinoctial(OrbitType::Equinoctial, AngleType::Mean)]
fn gauss_newton_pv(#[case] orbit_type: OrbitType, #[case] angle_type: AngleType) {
    let _ = pretty_env_logger::try_init();

    let truth = leo_state();
    let measurements = pv_measurements(&truth);
    assert_eq!(measurements.len(), 25);

    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(initial_guess(&truth), orbit_type, angle_type)])
        .build();
    bls.add_measurements(measurements.clone());

    let solution = bls.estimate().unwrap();
    println!("{solution}");

    assert!(solution.iterations <= 10);
    assert!(solution.rms < 0.1, "RMS {}", solution.rms);
    let (err_p, err_v, _) = solution.states[0].rss(&truth);
    assert!(err_p < 1e-3, "position error {err_p} km");
    assert!(err_v < 1e-6, "velocity error {err_v} km/s");

    assert_eq!(solution.residuals.len(), measurements.len());
    assert_eq!(solution.covariance.shape(), (6, 6));
    assert!(solution.sigmas().iter().all(|s| *s > 0.0));

    let diagnostics = bls.diagnostics().unwrap();
    assert_eq!(diagnostics.evaluations, solution.evaluations);
    assert_eq!(diagnostics.rms, solution.rms);
}

#[rstest]
fn levenberg_marquardt_pv() {
    let _ = pretty_env_logger::try_init();

    let truth = leo_state();
    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(initial_guess(&truth), OrbitType::Keplerian, AngleType::True)])
        .solver(BLSSolver::LevenbergMarquardt)
        .max_iterations(20)
        .max_evaluations(40)
        .build();
    bls.add_measurements(pv_measurements(&truth));

    let solution = bls.estimate().unwrap();
    let (err_p, err_v, _) = solution.states[0].rss(&truth);
    assert!(err_p < 1e-3, "position error {err_p} km");
    assert!(err_v < 1e-6, "velocity error {err_v} km/s");
    assert!(solution.evaluations >= solution.iterations + 1);
}

#[rstest]
fn ground_tracking_with_bias() {
    let _ = pretty_env_logger::try_init();

    let truth = meo_state();
    let madrid = GroundStation::from_point("Madrid", 40.427_222, -4.250_556, 0.834_939, EARTH_J2000)
        .with_elevation_mask(5.0);
    let canberra =
        GroundStation::from_point("Canberra", -35.398_333, 148.981_944, 0.691_750, EARTH_J2000)
            .with_elevation_mask(5.0);
    let goldstone =
        GroundStation::from_point("Goldstone", 35.247_164, 243.205, 1.071_149_04, EARTH_J2000)
            .with_elevation_mask(5.0);

    let bias_km = 0.05;
    let true_bias = ParameterDriver::new(&range_bias_name(&madrid), bias_km, 1e-3, -1.0, 1.0).unwrap();

    let mut builders: Vec<Arc<dyn MeasurementBuilder>> = Vec::new();
    for station in [&madrid, &canberra, &goldstone] {
        builders.push(Arc::new(RangeBuilder {
            station: station.clone(),
            sigma_km: 1e-3,
            base_weight: 1.0,
            propagator: 0,
            bias: if station.name == madrid.name {
                Some(true_bias.clone())
            } else {
                None
            },
        }));
        builders.push(Arc::new(RangeRateBuilder {
            station: station.clone(),
            sigma_km_s: 1e-6,
            base_weight: 1.0,
            propagator: 0,
        }));
    }
    let simulated = simulate(&truth, 12 * Unit::Hour, 10 * Unit::Minute, builders);
    println!("{} measurements", simulated.len());
    assert!(simulated.len() > 20);

    // The bias is estimated from a null a priori
    let estimated_bias = ParameterDriver::new(&range_bias_name(&madrid), 0.0, 1e-3, -1.0, 1.0)
        .unwrap()
        .estimated();
    let measurements = simulated.into_iter().map(|msr| {
        let biased = matches!(
            &msr.model,
            MeasurementModel::Range { station, .. } if station.name == madrid.name
        );
        if biased {
            msr.with_bias(estimated_bias.clone())
        } else {
            msr
        }
    });

    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(initial_guess(&truth), OrbitType::Equinoctial, AngleType::True)])
        .build();
    bls.add_measurements(measurements);
    assert_eq!(bls.parameters().unwrap().estimated_count(), 7);

    let solution = bls.estimate().unwrap();
    println!("{solution}");

    let bias = &solution.parameters.measurements[0];
    assert!((bias.value() - bias_km).abs() < 1e-3, "bias {} km", bias.value());
    let (err_p, err_v, _) = solution.states[0].rss(&truth);
    assert!(err_p < 1e-2, "position error {err_p} km");
    assert!(err_v < 1e-5, "velocity error {err_v} km/s");
    assert_eq!(solution.covariance.shape(), (7, 7));
}

#[rstest]
fn no_iteration_allowed() {
    let _ = pretty_env_logger::try_init();

    let truth = leo_state();
    let measurements = pv_measurements(&truth);
    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(initial_guess(&truth), OrbitType::Cartesian, AngleType::True)])
        .build();
    bls.add_measurements(measurements.clone());
    bls.set_max_iterations(0);

    assert_eq!(
        bls.estimate().unwrap_err(),
        BLSError::MaxIterationsReached { max_iterations: 0 }
    );
    let diagnostics = bls.diagnostics().unwrap();
    assert_eq!(diagnostics.iterations, 0);
    assert_eq!(diagnostics.evaluations, 1);
    assert_eq!(diagnostics.residuals.len(), measurements.len());
    assert!(diagnostics.covariance.is_some());
}

#[rstest]
fn evaluation_budget() {
    let truth = leo_state();
    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(initial_guess(&truth), OrbitType::Cartesian, AngleType::True)])
        .build();
    bls.add_measurements(pv_measurements(&truth));
    bls.set_max_evaluations(2);

    assert_eq!(
        bls.estimate().unwrap_err(),
        BLSError::MaxEvaluationsReached { max_evaluations: 2 }
    );
    assert_eq!(bls.diagnostics().unwrap().evaluations, 2);
}

#[rstest]
fn too_few_measurements() {
    let truth = meo_state();
    let station = GroundStation::from_point("Equator", 0.0, 0.0, 0.0, EARTH_J2000);
    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(truth.clone(), OrbitType::Cartesian, AngleType::True)])
        .build();
    bls.add_measurement(Measurement::range(station, truth.epoch(), 20_000.0, 1e-3, 1.0, 0).unwrap());

    assert_eq!(
        bls.estimate().unwrap_err(),
        BLSError::TooFewMeasurements { count: 1, needed: 6 }
    );
    assert!(bls.diagnostics().is_none());
}

#[rstest]
fn unobserved_arc_is_singular() {
    let _ = pretty_env_logger::try_init();

    let truth = leo_state();
    // The second arc has no measurement, so its parameters are not observable
    let mut bls = BatchLeastSquares::builder()
        .builders(vec![
            arc_builder(initial_guess(&truth), OrbitType::Cartesian, AngleType::True),
            arc_builder(truth.clone(), OrbitType::Cartesian, AngleType::True),
        ])
        .build();
    bls.add_measurements(pv_measurements(&truth));

    assert!(matches!(
        bls.estimate(),
        Err(BLSError::SingularMatrix { .. })
    ));
    let diagnostics = bls.diagnostics().unwrap();
    assert_eq!(diagnostics.evaluations, 1);
    assert!(diagnostics.covariance.is_none());
}

#[rstest]
fn unknown_arc() {
    let truth = leo_state();
    let mut bls = BatchLeastSquares::builder()
        .builders(vec![arc_builder(truth.clone(), OrbitType::Cartesian, AngleType::True)])
        .build();
    let mut measurements = pv_measurements(&truth);
    measurements[3].propagators = vec![2];
    bls.add_measurements(measurements);

    assert!(matches!(bls.estimate(), Err(BLSError::BLSConfig { .. })));
}

#[rstest]
fn inter_satellite_ranging() {
    let _ = pretty_env_logger::try_init();

    let chief = leo_state();
    let deputy = chief.clone().with_orbit(
        Orbit::keplerian(7100.0, 0.02, 35.0, 40.0, 50.0, 55.0, chief.epoch(), EARTH_J2000).unwrap(),
    );

    // Both arcs are tracked in position and velocity, and ranged from one another
    let prop = Propagator::default(two_body());
    let generator = Generator::builder()
        .start(chief.epoch())
        .end(chief.epoch() + 2 * Unit::Hour)
        .step(10 * Unit::Minute)
        .build()
        .with_builder(Arc::new(PVBuilder {
            sigma_position_km: 1e-3,
            sigma_velocity_km_s: 1e-6,
            base_weight: 1.0,
            propagator: 0,
        }))
        .with_builder(Arc::new(PVBuilder {
            sigma_position_km: 1e-3,
            sigma_velocity_km_s: 1e-6,
            base_weight: 1.0,
            propagator: 1,
        }))
        .with_builder(Arc::new(InterSatelliteRangeBuilder {
            sigma_km: 1e-4,
            base_weight: 1.0,
            local: 0,
            remote: 1,
        }));
    let measurements = generator
        .generate(&[(&prop, chief.clone()), (&prop, deputy.clone())], None)
        .unwrap();
    assert_eq!(measurements.len(), 3 * 13);

    let mut bls = BatchLeastSquares::builder()
        .builders(vec![
            arc_builder(initial_guess(&chief), OrbitType::Cartesian, AngleType::True),
            arc_builder(initial_guess(&deputy), OrbitType::Keplerian, AngleType::True),
        ])
        .build();
    bls.add_measurements(measurements);

    let solution = bls.estimate().unwrap();
    assert_eq!(solution.states.len(), 2);
    assert_eq!(solution.covariance.shape(), (12, 12));
    for (state, truth) in solution.states.iter().zip([&chief, &deputy]) {
        let (err_p, err_v, _) = state.rss(truth);
        assert!(err_p < 1e-3, "position error {err_p} km");
        assert!(err_v < 1e-6, "velocity error {err_v} km/s");
    }
}

#[rstest]
fn drag_coefficient_with_orbit() {
    let _ = pretty_env_logger::try_init();

    let drag = |cd: f64| {
        SpacecraftDynamics::from_model(
            OrbitalDynamics::two_body(),
            Drag::new(ExponentialAtmosphere::earth_400km(), cd).unwrap(),
        )
    };
    let orbit =
        Orbit::keplerian(6778.0, 0.001, 51.6, 10.0, 20.0, 30.0, crate::test_epoch(), EARTH_J2000).unwrap();
    let truth = SpacecraftState::new(orbit, 100.0).with_drag_area(10.0);

    let truth_prop = Propagator::default(drag(2.5));
    let measurements = Generator::builder()
        .start(truth.epoch())
        .end(truth.epoch() + 6 * Unit::Hour)
        .step(10 * Unit::Minute)
        .build()
        .with_builder(Arc::new(PVBuilder {
            sigma_position_km: 1e-3,
            sigma_velocity_km_s: 1e-6,
            base_weight: 1.0,
            propagator: 0,
        }))
        .generate(&[(&truth_prop, truth.clone())], None)
        .unwrap();

    let builder = PropagatorBuilder::new::<Dormand45>(
        initial_guess(&truth),
        drag(2.0),
        PropOpts::default(),
        OrbitType::Cartesian,
        AngleType::True,
        0.1,
    )
    .unwrap()
    .with_estimated_parameter(DRAG_COEFFICIENT)
    .unwrap();

    let mut bls = BatchLeastSquares::builder().builders(vec![builder]).build();
    bls.add_measurements(measurements);
    assert_eq!(bls.parameters().unwrap().estimated_count(), 7);

    let solution = bls.estimate().unwrap();
    println!("{solution}");

    let cd = solution.parameters.arcs[0].propagation[0].value();
    assert!((cd - 2.5).abs() < 1e-3, "Cd = {cd}");
    let (err_p, err_v, _) = solution.states[0].rss(&truth);
    assert!(err_p < 1e-3, "position error {err_p} km");
    assert!(err_v < 1e-6, "velocity error {err_v} km/s");
    assert_eq!(solution.covariance.shape(), (7, 7));
}

#[rstest]
fn arc_stopped_by_event() {
    let truth = leo_state();
    // The default handler stops the propagation, before the last measurements of the arc
    let stop = DateDetector::date(truth.epoch() + 32 * Unit::Minute);
    let builder = arc_builder(initial_guess(&truth), OrbitType::Cartesian, AngleType::True)
        .with_event_detector(Arc::new(stop));

    let mut bls = BatchLeastSquares::builder().builders(vec![builder]).build();
    bls.add_measurements(pv_measurements(&truth));

    match bls.estimate() {
        Err(BLSError::Propagation {
            arc: 0,
            source: PropagationError::StoppedBefore { stopped, .. },
        }) => assert!((stopped - (truth.epoch() + 32 * Unit::Minute)).abs() <= 1 * Unit::Microsecond),
        other => panic!("expected an early stop, got {other:?}"),
    }
}
