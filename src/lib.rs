pub mod bridge;
pub mod config;
pub mod engine;
pub mod event;
pub mod fixtures;

pub use bridge::{RuntimeContext, VoipBridge, VoipBridgeBuilder};
pub use event::{BridgeEvent, EventReceiver, EventSender};
