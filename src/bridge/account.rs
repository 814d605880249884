use super::VoipBridge;
use crate::engine::{AccountSetup, Credential};
use anyhow::Result;
use tracing::{info, warn};

impl VoipBridge {
    /// Replaces the active account. The previous account is deleted before the
    /// new one is added, so two conflicting identities never coexist; if the
    /// add fails the session is left with no active account, and the caller
    /// must issue a fresh `register` rather than retry the old state.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        domain: &str,
        proxy: Option<&str>,
    ) -> Result<()> {
        let mut state = self.lock_state();
        self.ensure_ready_locked(&mut state)?;

        if let Some(old) = state.account.take() {
            if let Err(e) = self.engine.delete_account(old) {
                warn!(account = old, "failed to delete previous account: {}", e);
            }
        }

        let setup = AccountSetup {
            id_uri: format!("sip:{}@{}", username, domain),
            registrar_uri: format!("sip:{}", domain),
            credential: Credential {
                realm: "*".to_string(),
                scheme: "digest".to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
            proxy: proxy.filter(|p| !p.is_empty()).map(str::to_string),
            register_on_add: true,
            make_default: true,
        };
        let account = self.engine.add_account(&setup)?;
        state.account = Some(account);
        info!(account, uri = %setup.id_uri, "account added");
        Ok(())
    }

    /// Requests an expiry-0 de-registration for the active account. The
    /// account object stays alive so the engine can complete the exchange and
    /// still report the resulting registration event.
    pub fn unregister(&self) {
        let state = self.lock_state();
        let Some(account) = state.account else {
            return;
        };
        if let Err(e) = self.engine.set_registration(account, false) {
            warn!(account, "de-registration request failed: {}", e);
        }
    }
}
