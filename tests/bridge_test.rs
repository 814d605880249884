use sipbridge::engine::{CallState, EngineError};
use sipbridge::fixtures::SimulatedEngine;
use sipbridge::{BridgeEvent, EventReceiver, VoipBridgeBuilder};
use std::time::Duration;
use tokio::time::timeout;

async fn next_event(events: &mut EventReceiver) -> BridgeEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn register_and_observe_registration_event() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();

    assert!(bridge.init().is_ok());
    let mut events = bridge.subscribe();
    assert!(bridge
        .register("alice", "secret", "example.com", None)
        .is_ok());

    engine.complete_registration(200, "OK");
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::Registration {
            code: 200,
            text: "OK".to_string(),
        }
    );
}

#[tokio::test]
async fn outbound_call_reports_connection_once() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    bridge
        .register("alice", "secret", "example.com", None)
        .unwrap();
    let mut events = bridge.subscribe();

    let call = bridge.place_call("5551234").unwrap();
    engine.set_call_state(call, CallState::Early, 183, "Session Progress");
    engine.flush();
    engine.set_call_state(call, CallState::Confirmed, 200, "OK");

    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::CallConnected { call_id: call }
    );
    // no further events are pending for the confirmed call
    assert!(timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn audio_fallback_recovers_without_surfacing_an_error() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    bridge
        .register("alice", "secret", "example.com", None)
        .unwrap();
    let mut events = bridge.subscribe();

    engine.push_make_call_error(EngineError::NoAudioDevice);
    assert!(bridge.place_call("5551234").is_ok());

    assert_eq!(engine.make_call_attempts(), 2);
    assert_eq!(engine.null_binds(), 1);
    assert!(timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn unrelated_placement_failure_surfaces_one_call_error() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    bridge
        .register("alice", "secret", "example.com", None)
        .unwrap();
    let mut events = bridge.subscribe();

    engine.push_make_call_error(EngineError::Rejected("Invalid destination URI".to_string()));
    assert!(bridge.place_call("not a number").is_err());

    match next_event(&mut events).await {
        BridgeEvent::CallError { reason } => {
            assert!(reason.contains("Invalid destination URI"), "{}", reason)
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn inbound_call_lifecycle_end_to_end() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    let mut events = bridge.subscribe();

    let call = engine.push_incoming_call();
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::IncomingCall { call_id: call }
    );

    bridge.answer_call(call).unwrap();
    engine.set_call_state(call, CallState::Confirmed, 200, "OK");
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::CallConnected { call_id: call }
    );

    bridge.hangup_call(call).unwrap();
    engine.set_call_state(call, CallState::Disconnected, 200, "Normal call clearing");
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::CallEnded {
            call_id: call,
            code: 200,
            reason: "Normal call clearing".to_string(),
        }
    );
    assert_eq!(engine.hangups(), vec![call]);
}
