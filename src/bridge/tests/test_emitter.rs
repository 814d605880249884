use crate::bridge::{RuntimeContext, VoipBridgeBuilder};
use crate::engine::CallState;
use crate::event::BridgeEvent;
use crate::fixtures::{RecordingRuntime, SimulatedEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const EVENT_WAIT: Duration = Duration::from_secs(2);

async fn next_event(events: &mut crate::event::EventReceiver) -> BridgeEvent {
    timeout(EVENT_WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + EVENT_WAIT;
    while !check() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[tokio::test]
async fn incoming_call_is_announced_and_acknowledged_with_ringing() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    let mut events = bridge.subscribe();

    let call = engine.push_incoming_call();
    assert_eq!(next_event(&mut events).await, BridgeEvent::IncomingCall { call_id: call });
    wait_until(|| engine.answers() == vec![(call, 180)]);
}

#[tokio::test]
async fn confirmed_and_disconnected_are_the_only_surfaced_transitions() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    let mut events = bridge.subscribe();

    let call = engine.push_incoming_call();
    // flush between transitions so every callback sees the state it was
    // queued under
    engine.set_call_state(call, CallState::Early, 183, "Session Progress");
    engine.flush();
    engine.set_call_state(call, CallState::Confirmed, 200, "OK");
    engine.flush();
    engine.set_call_state(call, CallState::Disconnected, 486, "Busy Here");

    assert_eq!(next_event(&mut events).await, BridgeEvent::IncomingCall { call_id: call });
    assert_eq!(next_event(&mut events).await, BridgeEvent::CallConnected { call_id: call });
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::CallEnded {
            call_id: call,
            code: 486,
            reason: "Busy Here".to_string(),
        }
    );
}

#[tokio::test]
async fn active_media_connects_call_audio() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();

    let call = engine.push_incoming_call();
    engine.set_media_active(call, true);
    wait_until(|| engine.connected_audio() == vec![call]);
}

#[tokio::test]
async fn registration_event_carries_engine_status() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge
        .register("alice", "secret", "example.com", None)
        .unwrap();
    let mut events = bridge.subscribe();

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
async fn engine_callback_thread_is_registered_once() {
    let engine = SimulatedEngine::new();
    let bridge = VoipBridgeBuilder::new(engine.clone()).build();
    bridge.init().unwrap();
    let mut events = bridge.subscribe();

    let call = engine.push_incoming_call();
    engine.set_call_state(call, CallState::Confirmed, 200, "OK");
    engine.flush();
    engine.set_call_state(call, CallState::Disconnected, 200, "Normal call clearing");

    // drain the three events so all callbacks have run
    for _ in 0..3 {
        next_event(&mut events).await;
    }
    assert_eq!(engine.registered_thread_count(), 1);
}

#[tokio::test]
async fn emission_attaches_and_detaches_symmetrically() {
    let engine = SimulatedEngine::new();
    let runtime = RecordingRuntime::new();
    let bridge = VoipBridgeBuilder::new(engine.clone())
        .with_runtime(runtime.clone() as Arc<dyn RuntimeContext>)
        .build();
    bridge.init().unwrap();
    let mut events = bridge.subscribe();

    let call = engine.push_incoming_call();
    engine.set_call_state(call, CallState::Confirmed, 200, "OK");
    for _ in 0..2 {
        next_event(&mut events).await;
    }

    assert!(runtime.attaches() > 0);
    assert_eq!(runtime.attaches(), runtime.detaches());
}

#[tokio::test]
async fn attach_failure_drops_events_without_disturbing_the_engine() {
    let engine = SimulatedEngine::new();
    let runtime = RecordingRuntime::new();
    runtime.set_fail_attach(true);
    let bridge = VoipBridgeBuilder::new(engine.clone())
        .with_runtime(runtime.clone() as Arc<dyn RuntimeContext>)
        .build();
    bridge.init().unwrap();
    let mut events = bridge.subscribe();

    let call = engine.push_incoming_call();
    // the notification is lost, but the provisional ringing ack still happens
    wait_until(|| engine.answers() == vec![(call, 180)]);
    assert!(timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());
}
