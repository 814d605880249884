use crate::engine::CallId;
use serde::{Deserialize, Serialize};

/// BridgeEvent crosses from the engine's callback threads to the host.
///
/// Events for the same call are delivered in the order the engine observed the
/// transitions; there is no ordering guarantee across different calls or
/// between account and call events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Registration status changed.
    Registration { code: u16, text: String },
    /// New inbound call, already acknowledged with 180 Ringing.
    IncomingCall { call_id: CallId },
    /// Call entered the confirmed state.
    CallConnected { call_id: CallId },
    /// Call reached its terminal state.
    CallEnded {
        call_id: CallId,
        code: u16,
        reason: String,
    },
    /// Outbound call placement failed.
    CallError { reason: String },
}

/// Type alias for the event sender
pub type EventSender = tokio::sync::broadcast::Sender<BridgeEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::broadcast::Receiver<BridgeEvent>;
