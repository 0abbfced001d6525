extern crate pretty_env_logger;

use crate::leo_state;
use nyx_od::cosmic::{LvlhAttitude, Orbit, SpacecraftState};
use nyx_od::dynamics::{OrbitalDynamics, SpacecraftDynamics};
use nyx_od::linalg::Vector3;
use nyx_od::md::events::*;
use nyx_od::propagators::*;
use nyx_od::time::Unit;
use rstest::*;
use std::sync::Arc;

#[fixture]
fn prop() -> Propagator<SpacecraftDynamics, RSSCartesianStep> {
    Propagator::default(SpacecraftDynamics::new(OrbitalDynamics::two_body()))
}

#[fixture]
fn leo() -> SpacecraftState {
    leo_state()
}

#[rstest]
fn stops_at_event_epoch(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let event_epoch = leo.epoch() + 1234.5 * Unit::Second;
    let prop = prop.with_event_detector(Arc::new(DateDetector::date(event_epoch)));

    let mut instance = prop.with(leo).unwrap();
    let end = instance.for_duration(1 * Unit::Hour).unwrap();
    println!("{}", instance.event_log()[0]);

    assert!((end.epoch() - event_epoch).abs() <= 1 * Unit::Microsecond);
    assert_eq!(instance.event_log().len(), 1);
    assert_eq!(instance.event_log()[0].action, Action::Stop);
    assert!(instance.event_log()[0].increasing);
}

#[rstest]
fn stops_at_event_epoch_backward(
    prop: Propagator<SpacecraftDynamics, RSSCartesianStep>,
    leo: SpacecraftState,
) {
    let _ = pretty_env_logger::try_init();

    let event_epoch = leo.epoch() - 1000 * Unit::Second;
    let prop = prop.with_event_detector(Arc::new(DateDetector::date(event_epoch)));

    let mut instance = prop.with(leo).unwrap();
    let end = instance.for_duration(-1 * Unit::Hour).unwrap();
    assert!((end.epoch() - event_epoch).abs() <= 1 * Unit::Microsecond);
    // Backward, the time since the date decreases through zero
    assert!(!instance.event_log()[0].increasing);
}

#[rstest]
fn apsides_are_monotonic(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let record = RecordAndContinue::new();
    let detector = ApsisDetector::apsis()
        .with_max_check(300 * Unit::Second)
        .with_handler(Arc::new(record.clone()));
    let prop = prop.with_event_detector(Arc::new(detector));

    let period = leo.orbit.period().unwrap();
    let mut instance = prop.with(leo.clone()).unwrap();
    let end = instance.for_duration(2.0 * period).unwrap();
    assert_eq!(end.epoch(), leo.epoch() + 2.0 * period);

    let records = record.records();
    // Starting between periapsis and apoapsis: apoapsis, periapsis, apoapsis, periapsis
    assert_eq!(records.len(), 4, "{records:?}");
    for (i, (state, increasing)) in records.iter().enumerate() {
        let ta_deg = state.orbit.ta_deg().unwrap();
        if i % 2 == 0 {
            assert!(!increasing);
            assert!((ta_deg - 180.0).abs() < 1e-3, "apoapsis at {ta_deg} deg");
        } else {
            assert!(increasing);
            assert!(ta_deg < 1e-3 || ta_deg > 360.0 - 1e-3, "periapsis at {ta_deg} deg");
        }
    }
    for pair in records.windows(2) {
        assert!(pair[1].0.epoch() > pair[0].0.epoch());
    }
    assert_eq!(instance.event_log().len(), 4);
}

#[rstest]
fn earliest_event_first(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let late = DateDetector::date(leo.epoch() + 200 * Unit::Second).with_handler(Arc::new(ContinueOnEvent));
    let early = DateDetector::date(leo.epoch() + 100 * Unit::Second).with_handler(Arc::new(ContinueOnEvent));
    let prop = prop
        .with_event_detector(Arc::new(late))
        .with_event_detector(Arc::new(early));

    let mut instance = prop.with(leo.clone()).unwrap();
    instance.for_duration(10 * Unit::Minute).unwrap();

    let log = instance.event_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].index, 1);
    assert_eq!(log[1].index, 0);
    assert!(log[0].epoch < log[1].epoch);
}

#[rstest]
fn simultaneous_events_by_registration(
    prop: Propagator<SpacecraftDynamics, RSSCartesianStep>,
    leo: SpacecraftState,
) {
    let _ = pretty_env_logger::try_init();

    let epoch = leo.epoch() + 150 * Unit::Second;
    let record = DateDetector::date(epoch).with_handler(Arc::new(ContinueOnEvent));
    let stop = DateDetector::date(epoch);
    let unreached = DateDetector::date(epoch).with_handler(Arc::new(ContinueOnEvent));
    let prop = prop
        .with_event_detector(Arc::new(record))
        .with_event_detector(Arc::new(stop))
        .with_event_detector(Arc::new(unreached));

    let mut instance = prop.with(leo).unwrap();
    let end = instance.for_duration(1 * Unit::Hour).unwrap();

    // All three events are at the same epoch: the first continues, the second stops, the third is never dispatched
    let log = instance.event_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].index, 0);
    assert_eq!(log[0].action, Action::Continue);
    assert_eq!(log[1].index, 1);
    assert_eq!(log[1].action, Action::Stop);
    assert_eq!(log[0].epoch, log[1].epoch);
    assert_eq!(end.epoch(), log[1].epoch);
}

#[rstest]
fn impulsive_maneuver_reset(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let dv_km_s = Vector3::new(0.0, 0.01, 0.0);
    let burn_epoch = leo.epoch() + 20 * Unit::Minute;
    let end_epoch = leo.epoch() + 1 * Unit::Hour;

    // Same maneuver, applied manually
    let mut coast = prop.with(leo.clone()).unwrap();
    let before = coast.until_epoch(burn_epoch).unwrap();
    let after = before.clone().with_dv_km_s(
        LvlhAttitude::dcm_from_inertial(&before.orbit).transpose() * dv_km_s,
    );
    let expected = prop.with(after).unwrap().until_epoch(end_epoch).unwrap();

    let detector = DateDetector::date(burn_epoch).with_handler(Arc::new(ImpulsiveManeuver::lvlh(dv_km_s)));
    let maneuvering = prop.clone().with_event_detector(Arc::new(detector));
    let mut instance = maneuvering.with(leo.clone()).unwrap();
    let end = instance.until_epoch(end_epoch).unwrap();

    assert_eq!(end.epoch(), end_epoch);
    assert!(matches!(instance.event_log()[0].action, Action::ResetState(_)));
    assert!(end.orbit.sma_km().unwrap() > leo.orbit.sma_km().unwrap() + 10.0);
    let (err_p, err_v, _) = end.rss(&expected);
    assert!(err_p < 1e-5 && err_v < 1e-8, "{err_p} km, {err_v} km/s");
}

#[derive(Debug)]
struct ShiftEpoch;

impl EventHandler for ShiftEpoch {
    fn event_occurred(&self, state: &SpacecraftState, _: bool) -> Result<Action, nyx_od::EventError> {
        let mut shifted = state.clone();
        shifted.orbit = shifted.orbit.with_epoch(state.epoch() + 1 * Unit::Second);
        Ok(Action::ResetState(shifted))
    }
}

#[rstest]
fn reset_at_another_epoch(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let detector = DateDetector::date(leo.epoch() + 5 * Unit::Minute).with_handler(Arc::new(ShiftEpoch));
    let prop = prop.with_event_detector(Arc::new(detector));
    let err = prop.with(leo).unwrap().for_duration(1 * Unit::Hour).unwrap_err();
    assert!(matches!(err, PropagationError::ResetEpoch { .. }), "{err}");
}

#[rstest]
fn closure_failure_is_fatal(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let detector = FunctionDetector::new(FunctionEvaluator::new("failing", |_| {
        Err(nyx_od::EventError::EvaluationFailed {
            event: "failing".to_string(),
            msg: "no data".to_string(),
        })
    }));
    let prop = prop.with_event_detector(Arc::new(detector));
    let err = prop.with(leo).and_then(|mut instance| instance.for_duration(1 * Unit::Hour));
    assert!(matches!(err, Err(PropagationError::PropEvent { .. })));
}

#[rstest]
fn reset_derivatives_resumes(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let reference = prop.with(leo.clone()).unwrap().for_duration(1 * Unit::Hour).unwrap();

    let detector = DateDetector::date(leo.epoch() + 17 * Unit::Minute)
        .with_handler(Arc::new(ResetDerivativesOnEvent));
    let prop = prop.with_event_detector(Arc::new(detector));
    let mut instance = prop.with(leo.clone()).unwrap();
    let end = instance.for_duration(1 * Unit::Hour).unwrap();

    assert_eq!(end.epoch(), leo.epoch() + 1 * Unit::Hour);
    assert_eq!(instance.event_log().len(), 1);
    assert_eq!(instance.event_log()[0].action, Action::ResetDerivatives);
    // Restarting the integrator at the event does not change the trajectory
    let (err_p, err_v, _) = end.rss(&reference);
    assert!(err_p < 1e-6 && err_v < 1e-9, "{err_p} km, {err_v} km/s");
}

#[rstest]
fn jacobian_through_maneuver(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let _ = pretty_env_logger::try_init();

    let duration = 1 * Unit::Hour;
    let burn = DateDetector::date(leo.epoch() + 20 * Unit::Minute)
        .with_handler(Arc::new(ImpulsiveManeuver::inertial(Vector3::new(0.0, 0.01, 0.005))));
    let prop = prop.with_event_detector(Arc::new(burn));
    let sensitive = prop.clone().with_sensitivity(Vec::new());

    let end = sensitive.with(leo.clone()).unwrap().for_duration(duration).unwrap();
    let jacobian = end.jacobian.clone().unwrap();

    // An inertial increment does not depend on the state, so the Jacobian is continuous through the burn
    let x0 = leo.orbit.to_cartesian_pos_vel();
    for j in 0..6 {
        let h = if j < 3 { 1e-3 } else { 1e-6 };
        let run = |sign: f64| {
            let mut x = x0;
            x[j] += sign * h;
            let state = leo
                .clone()
                .with_orbit(Orbit::from_cartesian_pos_vel(&x, leo.epoch(), leo.orbit.frame));
            prop.with(state)
                .unwrap()
                .for_duration(duration)
                .unwrap()
                .orbit
                .to_cartesian_pos_vel()
        };
        let fd = (run(1.0) - run(-1.0)) / (2.0 * h);
        let scale = fd.amax();
        for i in 0..6 {
            assert!(
                (jacobian[(i, j)] - fd[i]).abs() <= 1e-4 * scale,
                "∂x{i}/∂x0{j}: {} vs {}",
                jacobian[(i, j)],
                fd[i]
            );
        }
    }
}

#[rstest]
fn root_search_exhausted(prop: Propagator<SpacecraftDynamics, RSSCartesianStep>, leo: SpacecraftState) {
    let apsis = ApsisDetector::apsis()
        .with_threshold(1 * Unit::Nanosecond)
        .with_max_iterations(1);
    let prop = prop.with_event_detector(Arc::new(apsis));
    let err = prop.with(leo).unwrap().for_duration(2 * Unit::Hour).unwrap_err();
    assert!(
        matches!(
            err,
            PropagationError::PropEvent {
                source: nyx_od::EventError::RootSearchNotConverged { .. }
            }
        ),
        "{err}"
    );
}

#[rstest]
#[case::null_max_check(DateDetector::date(leo_state().epoch() + 5 * Unit::Minute).with_max_check(0 * Unit::Second))]
#[case::null_threshold(DateDetector::date(leo_state().epoch() + 5 * Unit::Minute).with_threshold(0 * Unit::Second))]
#[case::no_iteration(DateDetector::date(leo_state().epoch() + 5 * Unit::Minute).with_max_iterations(0))]
fn invalid_detector_settings(
    #[case] detector: DateDetector,
    prop: Propagator<SpacecraftDynamics, RSSCartesianStep>,
    leo: SpacecraftState,
) {
    let prop = prop.with_event_detector(Arc::new(detector));
    assert!(matches!(
        prop.with(leo),
        Err(PropagationError::PropConfigError { .. })
    ));
}
