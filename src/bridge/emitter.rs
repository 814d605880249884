use super::{ensure_engine_thread, ThreadBridge, VoipBridge};
use crate::engine::{AccountId, CallId, CallState, EngineObserver, SipEngine};
use crate::event::{BridgeEvent, EventSender};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Best-effort delivery across the thread boundary. Failures are logged and
/// swallowed; a lost notification must never destabilize the engine thread
/// that produced it.
fn emit_event(thread_bridge: &ThreadBridge, events: &EventSender, event: BridgeEvent) {
    match thread_bridge.run_attached(|| events.send(event).is_ok()) {
        Some(true) => {}
        Some(false) => debug!("event dropped: no subscribers"),
        None => debug!("event dropped: no runtime context"),
    }
}

impl VoipBridge {
    pub(crate) fn emit(&self, event: BridgeEvent) {
        emit_event(&self.thread_bridge, &self.events, event);
    }
}

/// Observer installed into the engine at init time and invoked on the engine's
/// own worker threads. Reads are snapshots taken outside the coordination
/// lock, so they may race benignly with in-flight mutations.
pub(crate) struct EventBridge {
    engine: Weak<dyn SipEngine>,
    events: EventSender,
    thread_bridge: Arc<ThreadBridge>,
}

impl EventBridge {
    pub(crate) fn new(
        engine: Weak<dyn SipEngine>,
        events: EventSender,
        thread_bridge: Arc<ThreadBridge>,
    ) -> Self {
        Self {
            engine,
            events,
            thread_bridge,
        }
    }

    fn emit(&self, event: BridgeEvent) {
        emit_event(&self.thread_bridge, &self.events, event);
    }
}

impl EngineObserver for EventBridge {
    fn on_incoming_call(&self, call: CallId) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        ensure_engine_thread(engine.as_ref());
        self.emit(BridgeEvent::IncomingCall { call_id: call });
        // provisional ringing ack; the application answers or hangs up later
        if let Err(e) = engine.answer(call, 180) {
            warn!(call, "failed to send ringing: {}", e);
        }
    }

    fn on_call_state(&self, call: CallId) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        ensure_engine_thread(engine.as_ref());
        let info = match engine.call_info(call) {
            Ok(info) => info,
            Err(e) => {
                debug!(call, "call info unavailable: {}", e);
                return;
            }
        };
        match info.state {
            CallState::Confirmed => self.emit(BridgeEvent::CallConnected { call_id: call }),
            CallState::Disconnected => self.emit(BridgeEvent::CallEnded {
                call_id: call,
                code: info.last_status_code,
                reason: info.last_status_text,
            }),
            _ => {}
        }
    }

    fn on_call_media_state(&self, call: CallId) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        ensure_engine_thread(engine.as_ref());
        match engine.call_info(call) {
            Ok(info) if info.media_active => {
                if let Err(e) = engine.connect_call_audio(call) {
                    warn!(call, "failed to connect call audio: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => debug!(call, "call info unavailable: {}", e),
        }
    }

    fn on_registration_state(&self, account: AccountId) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        ensure_engine_thread(engine.as_ref());
        match engine.account_info(account) {
            Ok(info) => self.emit(BridgeEvent::Registration {
                code: info.status_code,
                text: info.status_text,
            }),
            Err(e) => debug!(account, "account info unavailable: {}", e),
        }
    }
}
