use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Engine-assigned account identifier.
pub type AccountId = i32;
/// Engine-assigned call identifier.
pub type CallId = i32;

/// Errors reported at the engine boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine is not ready")]
    NotReady,
    #[error("no audio device available")]
    NoAudioDevice,
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("unknown call {0}")]
    UnknownCall(CallId),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("engine failure: {0}")]
    Internal(String),
}

/// Call state as the engine reports it. Only `Confirmed` and `Disconnected`
/// are surfaced as events; the rest are intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    Null,
    Calling,
    Incoming,
    Early,
    Connecting,
    Confirmed,
    Disconnected,
}

/// Point-in-time read of a call, recomputed from the engine on each callback.
#[derive(Debug, Clone)]
pub struct CallInfo {
    pub id: CallId,
    pub state: CallState,
    pub media_active: bool,
    pub last_status_code: u16,
    pub last_status_text: String,
    pub remote_uri: String,
}

#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub id: AccountId,
    pub uri: String,
    pub status_code: u16,
    pub status_text: String,
}

/// Digest credential attached to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub realm: String,
    pub scheme: String,
    pub username: String,
    pub password: String,
}

/// Everything the engine needs to create an account in one call.
#[derive(Debug, Clone)]
pub struct AccountSetup {
    pub id_uri: String,
    pub registrar_uri: String,
    pub credential: Credential,
    /// Sole outbound routing proxy, when present.
    pub proxy: Option<String>,
    /// Request immediate registration as part of the add.
    pub register_on_add: bool,
    /// Make this account the default routing identity for outbound calls.
    pub make_default: bool,
}

/// Fixed engine parameters. The transport, media clock and codec set are not
/// reconfigurable at runtime; `Default` carries the values this bridge runs
/// with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub udp_port: u16,
    pub clock_rate: u32,
    pub codec: String,
    pub echo_suppression: bool,
    pub video_enabled: bool,
    pub log_level: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            udp_port: 5060,
            clock_rate: 8000,
            codec: "PCMU/8000".to_string(),
            echo_suppression: true,
            video_enabled: false,
            log_level: 4,
        }
    }
}

/// Callbacks the engine raises on its own internally managed worker threads,
/// concurrently with host commands.
pub trait EngineObserver: Send + Sync {
    fn on_incoming_call(&self, call: CallId);
    fn on_call_state(&self, call: CallId);
    fn on_call_media_state(&self, call: CallId);
    fn on_registration_state(&self, account: AccountId);
}

/// The wrapped VoIP engine. The SIP state machine, RTP negotiation and codec
/// processing all live behind this seam; the bridge only sequences calls into
/// it and translates its callbacks.
#[cfg_attr(test, mockall::automock)]
pub trait SipEngine: Send + Sync {
    fn create(&self) -> Result<(), EngineError>;
    fn init(
        &self,
        settings: &EngineSettings,
        observer: Arc<dyn EngineObserver>,
    ) -> Result<(), EngineError>;
    fn add_transport(&self, port: u16) -> Result<(), EngineError>;
    fn start(&self) -> Result<(), EngineError>;
    fn destroy(&self);

    /// Registers the calling thread with the engine's thread bookkeeping.
    /// Callers must invoke this at most once per thread.
    fn register_thread(&self, name: &str);

    fn add_account(&self, setup: &AccountSetup) -> Result<AccountId, EngineError>;
    fn delete_account(&self, account: AccountId) -> Result<(), EngineError>;
    /// `active = false` requests an expiry-0 de-registration while keeping the
    /// account object alive.
    fn set_registration(&self, account: AccountId, active: bool) -> Result<(), EngineError>;
    fn account_info(&self, account: AccountId) -> Result<AccountInfo, EngineError>;

    fn make_call(&self, account: AccountId, target: &str) -> Result<CallId, EngineError>;
    fn answer(&self, call: CallId, code: u16) -> Result<(), EngineError>;
    fn hangup(&self, call: CallId) -> Result<(), EngineError>;
    fn dial_dtmf(&self, call: CallId, digits: &str) -> Result<(), EngineError>;
    fn call_info(&self, call: CallId) -> Result<CallInfo, EngineError>;

    /// Binds the platform default capture/playback pair.
    fn bind_sound_devices(&self) -> Result<(), EngineError>;
    /// Binds the silent device that discards capture and playback.
    fn bind_null_sound_device(&self) -> Result<(), EngineError>;
    /// Connects a call's media to the bound sound device.
    fn connect_call_audio(&self, call: CallId) -> Result<(), EngineError>;
}
