mod account;
mod audio;
mod call;
mod emitter;
mod lifecycle;
mod runtime;
#[cfg(test)]
mod tests;

pub use runtime::{ensure_engine_thread, AttachedRuntime, RuntimeContext, ThreadBridge};

use crate::engine::{AccountId, EngineSettings, SipEngine};
use crate::event::{EventReceiver, EventSender};
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Route the engine's sound is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    Unbound,
    Default,
    Null,
}

/// Session state guarded by the coordination lock. Every engine-mutating
/// operation holds this lock for its full duration.
pub(crate) struct SessionState {
    pub ready: bool,
    pub account: Option<AccountId>,
    pub audio: AudioRoute,
}

/// Facade over the wrapped VoIP engine.
///
/// One instance per process: the wrapped engine is itself a process-wide
/// singleton, so creating a second bridge over the same engine violates its
/// lifecycle contract. The bridge is `Send + Sync`; wrap it in an `Arc` to
/// share it across host threads.
pub struct VoipBridge {
    pub(crate) engine: Arc<dyn SipEngine>,
    pub(crate) settings: EngineSettings,
    pub(crate) events: EventSender,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) thread_bridge: Arc<ThreadBridge>,
    token: CancellationToken,
}

pub struct VoipBridgeBuilder {
    engine: Arc<dyn SipEngine>,
    settings: Option<EngineSettings>,
    runtime: Option<Arc<dyn RuntimeContext>>,
    cancel_token: Option<CancellationToken>,
    event_capacity: usize,
}

impl VoipBridgeBuilder {
    pub fn new(engine: Arc<dyn SipEngine>) -> Self {
        Self {
            engine,
            settings: None,
            runtime: None,
            cancel_token: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Installs the host runtime the engine's threads attach to before
    /// delivering events. Defaults to [`AttachedRuntime`], which treats every
    /// thread as already attached.
    pub fn with_runtime(mut self, runtime: Arc<dyn RuntimeContext>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> VoipBridge {
        let (events, _) = broadcast::channel(self.event_capacity);
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(AttachedRuntime) as Arc<dyn RuntimeContext>);
        VoipBridge {
            engine: self.engine,
            settings: self.settings.unwrap_or_default(),
            events,
            state: Mutex::new(SessionState {
                ready: false,
                account: None,
                audio: AudioRoute::Unbound,
            }),
            thread_bridge: Arc::new(ThreadBridge::new(Some(runtime))),
            token: self.cancel_token.unwrap_or_default(),
        }
    }
}

impl VoipBridge {
    /// Subscribes to the host-facing event stream.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn stop(&self) {
        info!("stopping");
        self.token.cancel();
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // a poisoned guard still protects a consistent SessionState
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn require_ready(&self, state: &SessionState) -> Result<()> {
        if state.ready {
            Ok(())
        } else {
            Err(anyhow!("engine is not ready"))
        }
    }
}
