extern crate pretty_env_logger;

use super::*;
use crate::leo_state;
use nyx_od::io::ConfigRepr;
use nyx_od::ConfigError;
use nyx_od::od::prelude::*;
use rstest::*;

#[rstest]
fn estimator_from_yaml() {
    let _ = pretty_env_logger::try_init();

    let settings = BLSSettings::loads(
        r#"
        solver: LevenbergMarquardt
        relative_threshold: 1.0e-6
        absolute_threshold: 1.0e-3
        max_iterations: 25
        max_evaluations: 50
        "#,
    )
    .unwrap();
    assert_eq!(settings.solver, BLSSolver::LevenbergMarquardt);
    assert_eq!(settings.lm_lambda_init, 1e-3);

    let truth = leo_state();
    let mut bls = BatchLeastSquares::from_settings(
        vec![arc_builder(initial_guess(&truth), OrbitType::Keplerian, AngleType::Mean)],
        settings,
    );
    bls.add_measurements(pv_measurements(&truth));

    let solution = bls.estimate().unwrap();
    let (err_p, _, _) = solution.states[0].rss(&truth);
    assert!(err_p < 1e-3, "position error {err_p} km");

    // Settings survive a round trip through YAML
    assert_eq!(BLSSettings::loads(&settings.dumps().unwrap()).unwrap(), settings);
}

#[rstest]
fn default_solver() {
    let settings = BLSSettings::loads(
        "relative_threshold: 1.0e-8\nabsolute_threshold: 1.0e-5\nmax_iterations: 5\nmax_evaluations: 5",
    )
    .unwrap();
    assert_eq!(settings.solver, BLSSolver::GaussNewton);
}

#[rstest]
fn stations_from_yaml() {
    let stations = GroundStation::loads_many(
        r#"
        - name: Madrid
          latitude_deg: 40.427222
          longitude_deg: -4.250556
          height_km: 0.834939
          elevation_mask_deg: 5.0
        - name: Canberra
          latitude_deg: -35.398333
          longitude_deg: 148.981944
        "#,
    )
    .unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].elevation_mask_deg, 5.0);
    assert_eq!(stations[1].height_km, 0.0);
    assert_eq!(stations[1].frame, EARTH_J2000);
    assert_eq!(
        stations[1],
        GroundStation::from_point("Canberra", -35.398333, 148.981944, 0.0, EARTH_J2000)
    );
}

#[rstest]
fn missing_settings_field() {
    assert!(matches!(
        BLSSettings::loads("solver: GaussNewton\nmax_iterations: 5"),
        Err(ConfigError::ParseError { .. })
    ));
}

#[rstest]
fn stations_from_file() {
    let path = std::env::temp_dir().join("nyx_od_stations.yaml");
    std::fs::write(
        &path,
        "Madrid:\n  name: Madrid\n  latitude_deg: 40.427222\n  longitude_deg: -4.250556\nGoldstone:\n  name: Goldstone\n  latitude_deg: 35.247164\n  longitude_deg: 243.205\n  elevation_mask_deg: 10.0\n",
    )
    .unwrap();

    let stations = GroundStation::load_named(&path).unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(stations["Goldstone"].elevation_mask_deg, 10.0);
    assert_eq!(stations["Madrid"].name, "Madrid");

    assert!(matches!(
        GroundStation::load(path.with_extension("missing")),
        Err(ConfigError::ReadError { .. })
    ));
}
