use super::VoipBridge;
use crate::engine::{CallId, EngineError};
use crate::event::BridgeEvent;
use anyhow::{anyhow, Result};
use tracing::{info, warn};

impl VoipBridge {
    /// Places an outbound call through the default account. When the engine
    /// reports that no audio device is bound, the null device is bound and
    /// placement is retried exactly once. Any terminal failure is also
    /// surfaced as a `call_error` event carrying the engine's reason text.
    pub fn place_call(&self, destination: &str) -> Result<CallId> {
        let mut state = self.lock_state();
        self.ensure_ready_locked(&mut state)?;
        let account = state.account.ok_or_else(|| anyhow!("no active account"))?;
        let target = format!("sip:{}", destination);

        let placed = match self.engine.make_call(account, &target) {
            Err(EngineError::NoAudioDevice) => {
                warn!(%target, "no audio device for call, retrying with null device");
                self.bind_null_locked(&mut state)
                    .map_err(|_| EngineError::NoAudioDevice)
                    .and_then(|_| self.engine.make_call(account, &target))
            }
            other => other,
        };
        match placed {
            Ok(call) => {
                info!(call, %target, "call placed");
                Ok(call)
            }
            Err(e) => {
                self.emit(BridgeEvent::CallError {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Sends the final 200 accept for an inbound call.
    pub fn answer_call(&self, call: CallId) -> Result<()> {
        let state = self.lock_state();
        self.require_ready(&state)?;
        self.engine.answer(call, 200)?;
        Ok(())
    }

    /// Valid in any call state; the engine maps the request onto the correct
    /// protocol action (CANCEL, BYE or a reject).
    pub fn hangup_call(&self, call: CallId) -> Result<()> {
        let state = self.lock_state();
        self.require_ready(&state)?;
        self.engine.hangup(call)?;
        Ok(())
    }

    /// Forwards the digit string verbatim.
    pub fn send_dtmf(&self, call: CallId, digits: &str) -> Result<()> {
        let state = self.lock_state();
        self.require_ready(&state)?;
        self.engine.dial_dtmf(call, digits)?;
        Ok(())
    }
}
