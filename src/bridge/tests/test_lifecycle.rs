use crate::bridge::VoipBridgeBuilder;
use crate::engine::{EngineError, MockSipEngine};
use crate::fixtures::{SimAudioRoute, SimulatedEngine};
use mockall::Sequence;
use std::sync::Arc;

#[test]
fn init_is_idempotent() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();

    assert!(bridge.init().is_ok());
    assert!(bridge.init().is_ok());
    assert_eq!(engine.create_calls(), 1);
    assert_eq!(engine.destroy_calls(), 0);
}

#[test]
fn failed_start_rolls_back_and_is_retryable() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();

    engine.fail_start_once();
    assert!(bridge.init().is_err());
    assert_eq!(engine.destroy_calls(), 1);

    // a later call retries from scratch
    assert!(bridge.init().is_ok());
    assert_eq!(engine.create_calls(), 2);
}

#[test]
fn failed_init_rolls_back() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();

    engine.fail_init_once();
    assert!(bridge.init().is_err());
    assert_eq!(engine.destroy_calls(), 1);
}

#[test]
fn transport_failure_destroys_partial_instance_before_start() {
    let mut engine = MockSipEngine::new();
    let mut seq = Sequence::new();
    engine
        .expect_create()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    engine
        .expect_init()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    engine
        .expect_add_transport()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(EngineError::Internal("bind failed".to_string())));
    engine
        .expect_destroy()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    engine.expect_start().never();

    let bridge = VoipBridgeBuilder::new(Arc::new(engine)).build();
    assert!(bridge.init().is_err());
}

#[test]
fn init_falls_back_to_null_audio_device() {
    let engine = SimulatedEngine::new();
    engine.fail_default_audio(true);
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();

    assert!(bridge.init().is_ok());
    assert_eq!(engine.bound_audio(), Some(SimAudioRoute::Null));
    assert_eq!(engine.null_binds(), 1);
}

#[test]
fn init_succeeds_without_any_audio_device() {
    let engine = SimulatedEngine::new();
    engine.fail_default_audio(true);
    engine.fail_null_audio(true);
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();

    // degraded but usable, e.g. registration-only sessions
    assert!(bridge.init().is_ok());
    assert_eq!(engine.bound_audio(), None);
}

#[test]
fn rebind_audio_recovers_after_device_returns() {
    let engine = SimulatedEngine::new();
    engine.fail_default_audio(true);
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    assert_eq!(engine.bound_audio(), Some(SimAudioRoute::Null));

    engine.fail_default_audio(false);
    assert!(bridge.rebind_audio().is_ok());
    assert_eq!(engine.bound_audio(), Some(SimAudioRoute::Default));
}
