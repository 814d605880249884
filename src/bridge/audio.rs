use super::{AudioRoute, SessionState, VoipBridge};
use anyhow::Result;
use tracing::{info, warn};

impl VoipBridge {
    /// Re-runs the default-then-null bind sequence, e.g. after the platform's
    /// audio permissions or device set changed.
    pub fn rebind_audio(&self) -> Result<()> {
        let mut state = self.lock_state();
        self.ensure_ready_locked(&mut state)?;
        self.bind_devices_locked(&mut state)
    }

    /// Binds the platform default capture/playback pair, falling back to the
    /// null device. Fails only when both binds fail; a silent session still
    /// registers and reports call state.
    pub(crate) fn bind_devices_locked(&self, state: &mut SessionState) -> Result<()> {
        match self.engine.bind_sound_devices() {
            Ok(()) => {
                state.audio = AudioRoute::Default;
                info!("default audio devices bound");
                Ok(())
            }
            Err(e) => {
                warn!("default audio bind failed: {}, trying null device", e);
                self.bind_null_locked(state)
            }
        }
    }

    pub(crate) fn bind_null_locked(&self, state: &mut SessionState) -> Result<()> {
        match self.engine.bind_null_sound_device() {
            Ok(()) => {
                state.audio = AudioRoute::Null;
                info!("null audio device bound");
                Ok(())
            }
            Err(e) => {
                state.audio = AudioRoute::Unbound;
                Err(e.into())
            }
        }
    }
}
