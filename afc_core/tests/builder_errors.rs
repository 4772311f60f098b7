use afc_core::Afc;
use afc_core::config::AfcCfg;
use afc_core::error::BuildError;
use afc_core::mocks::{IdentityScaler, NullTransport};
use afc_core::sampling::LinearScaler;
use afc_core::state::ControlMode;
use afc_hardware::SimTransport;
use rstest::rstest;

#[rstest]
fn missing_reverse_scaler_is_typed() {
    let err = Afc::builder()
        .with_forward_scaler(IdentityScaler)
        .with_transport(NullTransport)
        .try_build()
        .expect_err("should fail with MissingReverseScaler");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingReverseScaler) => {}
        other => panic!("expected MissingReverseScaler, got: {other:?}"),
    }
}

#[rstest]
fn missing_transport_is_typed() {
    let err = Afc::builder()
        .with_reverse_scaler(IdentityScaler)
        .with_forward_scaler(IdentityScaler)
        .try_build()
        .expect_err("should fail with MissingTransport");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingTransport)
    ));
}

#[rstest]
#[case::inverted_travel(|c: &mut AfcCfg| c.travel.min_position = c.travel.max_position)]
#[case::zero_step_rate(|c: &mut AfcCfg| c.actuator.slow_step_hz = 0)]
#[case::no_bands(|c: &mut AfcCfg| c.direction.rev_power_bands.clear())]
#[case::fast_window(|c: &mut AfcCfg| c.direction.min_fast_pulses = c.direction.max_fast_pulses + 1)]
#[case::wide_shift(|c: &mut AfcCfg| c.cooldown.bucket_shift = 32)]
#[case::power_clamp(|c: &mut AfcCfg| c.power.min_reading = c.power.max_reading)]
#[case::watchdog(|c: &mut AfcCfg| c.timing.watchdog_ms = c.timing.slow_tick_ms)]
fn invalid_configs_are_rejected(#[case] mutate: fn(&mut AfcCfg)) {
    let mut cfg = AfcCfg::default();
    mutate(&mut cfg);
    let err = Afc::builder()
        .with_config(cfg)
        .with_reverse_scaler(IdentityScaler)
        .with_forward_scaler(IdentityScaler)
        .with_transport(NullTransport)
        .build()
        .expect_err("config should be rejected");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn complete_builder_starts_in_startup() {
    let (afc, side) = Afc::builder()
        .with_reverse_scaler(LinearScaler::default())
        .with_forward_scaler(LinearScaler::default())
        .with_transport(SimTransport::new(64))
        .with_bring_up(|| Ok(()))
        .build()
        .unwrap();
    assert_eq!(afc.mode(), ControlMode::Startup);
    assert_eq!(side.position.position(), afc.cfg().travel.max_position);
}
