//! In-memory collaborators for tests and the demo binary: a scripted
//! [`SimulatedEngine`] whose callbacks fire on a dedicated worker thread, and
//! a [`RecordingRuntime`] that counts attach/detach traffic per thread.

use crate::bridge::RuntimeContext;
use crate::engine::{
    AccountId, AccountInfo, AccountSetup, CallId, CallInfo, CallState, EngineError,
    EngineObserver, EngineSettings, SipEngine,
};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAudioRoute {
    Default,
    Null,
}

#[derive(Debug, Clone)]
pub struct SimAccount {
    pub uri: String,
    pub registrar: String,
    pub proxy: Option<String>,
    pub status_code: u16,
    pub status_text: String,
}

enum Callback {
    IncomingCall(CallId),
    CallState(CallId),
    CallMediaState(CallId),
    RegistrationState(AccountId),
    Flush(mpsc::Sender<()>),
}

#[derive(Default)]
struct SimState {
    created: bool,
    started: bool,
    create_calls: usize,
    destroy_calls: usize,
    fail_init: bool,
    fail_start: bool,
    fail_default_audio: bool,
    fail_null_audio: bool,
    fail_next_add_account: Option<EngineError>,
    observer: Option<Arc<dyn EngineObserver>>,
    next_account: AccountId,
    next_call: CallId,
    accounts: HashMap<AccountId, SimAccount>,
    default_account: Option<AccountId>,
    calls: HashMap<CallId, CallInfo>,
    bound_audio: Option<SimAudioRoute>,
    make_call_errors: VecDeque<EngineError>,
    make_call_attempts: usize,
    null_binds: usize,
    answers: Vec<(CallId, u16)>,
    hangups: Vec<CallId>,
    dtmf: Vec<(CallId, String)>,
    deregistrations: Vec<AccountId>,
    connected_audio: Vec<CallId>,
    registered_threads: Vec<String>,
}

/// Scripted stand-in for the wrapped engine. Callbacks are delivered on one
/// long-lived worker thread, which mirrors the real engine's callback thread
/// and keeps per-call event order deterministic.
pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
    callbacks: mpsc::Sender<Callback>,
}

impl SimulatedEngine {
    pub fn new() -> Arc<Self> {
        let state = Arc::new(Mutex::new(SimState::default()));
        let (callbacks, rx) = mpsc::channel::<Callback>();
        let worker_state = state.clone();
        thread::Builder::new()
            .name("sim-engine-cb".to_string())
            .spawn(move || {
                while let Ok(callback) = rx.recv() {
                    let callback = match callback {
                        Callback::Flush(done) => {
                            done.send(()).ok();
                            continue;
                        }
                        other => other,
                    };
                    let observer = worker_state
                        .lock()
                        .map(|s| s.observer.clone())
                        .unwrap_or(None);
                    let Some(observer) = observer else {
                        continue;
                    };
                    match callback {
                        Callback::IncomingCall(call) => observer.on_incoming_call(call),
                        Callback::CallState(call) => observer.on_call_state(call),
                        Callback::CallMediaState(call) => observer.on_call_media_state(call),
                        Callback::RegistrationState(account) => {
                            observer.on_registration_state(account)
                        }
                        Callback::Flush(_) => {}
                    }
                }
            })
            .expect("spawn simulated engine worker");
        Arc::new(Self { state, callbacks })
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().expect("simulated engine state")
    }

    // -- failure scripts ----------------------------------------------------

    pub fn fail_init_once(&self) {
        self.lock().fail_init = true;
    }

    pub fn fail_start_once(&self) {
        self.lock().fail_start = true;
    }

    pub fn fail_default_audio(&self, fail: bool) {
        self.lock().fail_default_audio = fail;
    }

    pub fn fail_null_audio(&self, fail: bool) {
        self.lock().fail_null_audio = fail;
    }

    pub fn fail_next_add_account(&self, error: EngineError) {
        self.lock().fail_next_add_account = Some(error);
    }

    /// Queues an error for an upcoming `make_call`; attempts succeed once the
    /// queue is drained.
    pub fn push_make_call_error(&self, error: EngineError) {
        self.lock().make_call_errors.push_back(error);
    }

    // -- engine-side drivers ------------------------------------------------

    /// Blocks until the worker has delivered every callback queued so far.
    /// Call between state transitions when a test needs each callback to
    /// observe the state it was queued under.
    pub fn flush(&self) {
        let (done, wait) = mpsc::channel();
        if self.callbacks.send(Callback::Flush(done)).is_ok() {
            wait.recv().ok();
        }
    }

    /// Marks the default account's registration as settled and raises the
    /// registration callback.
    pub fn complete_registration(&self, code: u16, text: &str) {
        let account = {
            let mut state = self.lock();
            let Some(account) = state.default_account else {
                return;
            };
            if let Some(acc) = state.accounts.get_mut(&account) {
                acc.status_code = code;
                acc.status_text = text.to_string();
            }
            account
        };
        self.callbacks
            .send(Callback::RegistrationState(account))
            .ok();
    }

    /// Creates an inbound call and raises the incoming-call callback.
    pub fn push_incoming_call(&self) -> CallId {
        let call = {
            let mut state = self.lock();
            let call = state.next_call;
            state.next_call += 1;
            state.calls.insert(
                call,
                CallInfo {
                    id: call,
                    state: CallState::Incoming,
                    media_active: false,
                    last_status_code: 180,
                    last_status_text: "Ringing".to_string(),
                    remote_uri: "sip:remote@example.com".to_string(),
                },
            );
            call
        };
        self.callbacks.send(Callback::IncomingCall(call)).ok();
        call
    }

    /// Transitions a call and raises the call-state callback.
    pub fn set_call_state(&self, call: CallId, call_state: CallState, code: u16, text: &str) {
        {
            let mut state = self.lock();
            if let Some(info) = state.calls.get_mut(&call) {
                info.state = call_state;
                info.last_status_code = code;
                info.last_status_text = text.to_string();
            }
        }
        self.callbacks.send(Callback::CallState(call)).ok();
    }

    /// Flips media activation and raises the media-state callback.
    pub fn set_media_active(&self, call: CallId, active: bool) {
        {
            let mut state = self.lock();
            if let Some(info) = state.calls.get_mut(&call) {
                info.media_active = active;
            }
        }
        self.callbacks.send(Callback::CallMediaState(call)).ok();
    }

    // -- inspection ---------------------------------------------------------

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn destroy_calls(&self) -> usize {
        self.lock().destroy_calls
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    pub fn accounts(&self) -> Vec<SimAccount> {
        self.lock().accounts.values().cloned().collect()
    }

    pub fn default_account(&self) -> Option<AccountId> {
        self.lock().default_account
    }

    pub fn bound_audio(&self) -> Option<SimAudioRoute> {
        self.lock().bound_audio
    }

    pub fn make_call_attempts(&self) -> usize {
        self.lock().make_call_attempts
    }

    pub fn null_binds(&self) -> usize {
        self.lock().null_binds
    }

    pub fn answers(&self) -> Vec<(CallId, u16)> {
        self.lock().answers.clone()
    }

    pub fn hangups(&self) -> Vec<CallId> {
        self.lock().hangups.clone()
    }

    pub fn dtmf_sent(&self) -> Vec<(CallId, String)> {
        self.lock().dtmf.clone()
    }

    pub fn deregistrations(&self) -> Vec<AccountId> {
        self.lock().deregistrations.clone()
    }

    pub fn connected_audio(&self) -> Vec<CallId> {
        self.lock().connected_audio.clone()
    }

    pub fn registered_thread_count(&self) -> usize {
        self.lock().registered_threads.len()
    }
}

impl SipEngine for SimulatedEngine {
    fn create(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.create_calls += 1;
        state.created = true;
        Ok(())
    }

    fn init(
        &self,
        _settings: &EngineSettings,
        observer: Arc<dyn EngineObserver>,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.created {
            return Err(EngineError::Internal("init before create".to_string()));
        }
        if state.fail_init {
            state.fail_init = false;
            return Err(EngineError::Internal("scripted init failure".to_string()));
        }
        state.observer = Some(observer);
        Ok(())
    }

    fn add_transport(&self, _port: u16) -> Result<(), EngineError> {
        if self.lock().created {
            Ok(())
        } else {
            Err(EngineError::Internal("transport before create".to_string()))
        }
    }

    fn start(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.fail_start {
            state.fail_start = false;
            return Err(EngineError::Internal("scripted start failure".to_string()));
        }
        state.started = true;
        Ok(())
    }

    fn destroy(&self) {
        let mut state = self.lock();
        state.destroy_calls += 1;
        state.created = false;
        state.started = false;
        state.observer = None;
        state.accounts.clear();
        state.default_account = None;
        state.calls.clear();
        state.bound_audio = None;
    }

    fn register_thread(&self, name: &str) {
        self.lock().registered_threads.push(name.to_string());
    }

    fn add_account(&self, setup: &AccountSetup) -> Result<AccountId, EngineError> {
        let mut state = self.lock();
        if !state.started {
            return Err(EngineError::NotReady);
        }
        if let Some(error) = state.fail_next_add_account.take() {
            return Err(error);
        }
        let account = state.next_account;
        state.next_account += 1;
        state.accounts.insert(
            account,
            SimAccount {
                uri: setup.id_uri.clone(),
                registrar: setup.registrar_uri.clone(),
                proxy: setup.proxy.clone(),
                status_code: 100,
                status_text: "Trying".to_string(),
            },
        );
        if setup.make_default {
            state.default_account = Some(account);
        }
        Ok(account)
    }

    fn delete_account(&self, account: AccountId) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.accounts.remove(&account).is_none() {
            return Err(EngineError::UnknownAccount(account));
        }
        if state.default_account == Some(account) {
            state.default_account = None;
        }
        Ok(())
    }

    fn set_registration(&self, account: AccountId, active: bool) -> Result<(), EngineError> {
        {
            let mut state = self.lock();
            if !state.accounts.contains_key(&account) {
                return Err(EngineError::UnknownAccount(account));
            }
            if !active {
                state.deregistrations.push(account);
                if let Some(acc) = state.accounts.get_mut(&account) {
                    acc.status_code = 200;
                    acc.status_text = "OK".to_string();
                }
            }
        }
        self.callbacks
            .send(Callback::RegistrationState(account))
            .ok();
        Ok(())
    }

    fn account_info(&self, account: AccountId) -> Result<AccountInfo, EngineError> {
        let state = self.lock();
        let acc = state
            .accounts
            .get(&account)
            .ok_or(EngineError::UnknownAccount(account))?;
        Ok(AccountInfo {
            id: account,
            uri: acc.uri.clone(),
            status_code: acc.status_code,
            status_text: acc.status_text.clone(),
        })
    }

    fn make_call(&self, account: AccountId, target: &str) -> Result<CallId, EngineError> {
        let mut state = self.lock();
        state.make_call_attempts += 1;
        if !state.started {
            return Err(EngineError::NotReady);
        }
        if !state.accounts.contains_key(&account) {
            return Err(EngineError::UnknownAccount(account));
        }
        if let Some(error) = state.make_call_errors.pop_front() {
            return Err(error);
        }
        let call = state.next_call;
        state.next_call += 1;
        state.calls.insert(
            call,
            CallInfo {
                id: call,
                state: CallState::Calling,
                media_active: false,
                last_status_code: 100,
                last_status_text: "Trying".to_string(),
                remote_uri: target.to_string(),
            },
        );
        Ok(call)
    }

    fn answer(&self, call: CallId, code: u16) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.calls.contains_key(&call) {
            return Err(EngineError::UnknownCall(call));
        }
        state.answers.push((call, code));
        Ok(())
    }

    fn hangup(&self, call: CallId) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.calls.contains_key(&call) {
            return Err(EngineError::UnknownCall(call));
        }
        state.hangups.push(call);
        Ok(())
    }

    fn dial_dtmf(&self, call: CallId, digits: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.calls.contains_key(&call) {
            return Err(EngineError::UnknownCall(call));
        }
        state.dtmf.push((call, digits.to_string()));
        Ok(())
    }

    fn call_info(&self, call: CallId) -> Result<CallInfo, EngineError> {
        self.lock()
            .calls
            .get(&call)
            .cloned()
            .ok_or(EngineError::UnknownCall(call))
    }

    fn bind_sound_devices(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.fail_default_audio {
            return Err(EngineError::NoAudioDevice);
        }
        state.bound_audio = Some(SimAudioRoute::Default);
        Ok(())
    }

    fn bind_null_sound_device(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.null_binds += 1;
        if state.fail_null_audio {
            return Err(EngineError::NoAudioDevice);
        }
        state.bound_audio = Some(SimAudioRoute::Null);
        Ok(())
    }

    fn connect_call_audio(&self, call: CallId) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.calls.contains_key(&call) {
            return Err(EngineError::UnknownCall(call));
        }
        state.connected_audio.push(call);
        Ok(())
    }
}

/// Runtime context fake that tracks attachment per thread and counts
/// bridge-initiated attaches and detaches.
pub struct RecordingRuntime {
    attached: Mutex<HashSet<ThreadId>>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    fail_attach: AtomicBool,
}

impl RecordingRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            attached: Mutex::new(HashSet::new()),
            attaches: AtomicUsize::new(0),
            detaches: AtomicUsize::new(0),
            fail_attach: AtomicBool::new(false),
        })
    }

    /// Marks the current thread as attached without counting it, simulating a
    /// thread the host runtime manages itself.
    pub fn pre_attach_current(&self) {
        self.attached
            .lock()
            .expect("attached set")
            .insert(thread::current().id());
    }

    pub fn set_fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detaches(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

impl RuntimeContext for RecordingRuntime {
    fn is_attached(&self) -> bool {
        self.attached
            .lock()
            .expect("attached set")
            .contains(&thread::current().id())
    }

    fn attach(&self) -> Result<()> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(anyhow!("attach refused"));
        }
        self.attached
            .lock()
            .expect("attached set")
            .insert(thread::current().id());
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self) {
        self.attached
            .lock()
            .expect("attached set")
            .remove(&thread::current().id());
        self.detaches.fetch_add(1, Ordering::SeqCst);
    }
}
