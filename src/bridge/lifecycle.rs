use super::emitter::EventBridge;
use super::{SessionState, VoipBridge};
use crate::engine::EngineObserver;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

impl VoipBridge {
    /// Idempotent create/configure/start sequence. The engine observer is
    /// installed as part of this call. A session whose audio bind fails stays
    /// usable for registration-only scenarios.
    pub fn init(&self) -> Result<()> {
        let mut state = self.lock_state();
        self.ensure_ready_locked(&mut state)
    }

    /// Fast path when already ready. Otherwise runs the full startup sequence
    /// and rolls back by destroying the partial instance on any failure, so a
    /// later call retries from scratch.
    pub(crate) fn ensure_ready_locked(&self, state: &mut SessionState) -> Result<()> {
        if state.ready {
            return Ok(());
        }

        self.engine.create()?;

        let observer: Arc<dyn EngineObserver> = Arc::new(EventBridge::new(
            Arc::downgrade(&self.engine),
            self.events.clone(),
            self.thread_bridge.clone(),
        ));
        let started = self
            .engine
            .init(&self.settings, observer)
            .and_then(|_| self.engine.add_transport(self.settings.udp_port))
            .and_then(|_| self.engine.start());
        if let Err(e) = started {
            warn!("engine startup failed, rolling back: {}", e);
            self.engine.destroy();
            return Err(e.into());
        }
        state.ready = true;
        info!(
            port = self.settings.udp_port,
            clock_rate = self.settings.clock_rate,
            codec = %self.settings.codec,
            "engine started"
        );

        if let Err(e) = self.bind_devices_locked(state) {
            warn!("no usable audio device, continuing without audio: {}", e);
        }
        Ok(())
    }
}
