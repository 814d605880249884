use crate::engine::SipEngine;
use anyhow::Result;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, warn};

/// Host execution context that the engine's worker threads must join before
/// they may call across the boundary.
///
/// Attach state is per calling thread: `is_attached` answers for the current
/// thread, and `attach`/`detach` act on it.
pub trait RuntimeContext: Send + Sync {
    fn is_attached(&self) -> bool;
    fn attach(&self) -> Result<()>;
    fn detach(&self);
}

/// Scoped attach primitive for crossing from engine threads into the host.
pub struct ThreadBridge {
    runtime: Option<Arc<dyn RuntimeContext>>,
}

impl ThreadBridge {
    pub fn new(runtime: Option<Arc<dyn RuntimeContext>>) -> Self {
        Self { runtime }
    }

    /// Runs `work` with a guaranteed-valid execution context.
    ///
    /// A thread that already held a context before this call is never detached
    /// by it; only a bridge-initiated attach is paired with a detach. Returns
    /// `None` when no runtime is installed or the attach fails, in which case
    /// the caller's notification is dropped. Best-effort by contract: a lost
    /// notification must never destabilize the engine thread it came from.
    pub fn run_attached<F, R>(&self, work: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let runtime = match &self.runtime {
            Some(runtime) => runtime,
            None => {
                debug!("no runtime context installed, dropping work");
                return None;
            }
        };
        if runtime.is_attached() {
            return Some(work());
        }
        if let Err(e) = runtime.attach() {
            warn!("failed to attach thread to runtime: {}", e);
            return None;
        }
        let out = work();
        runtime.detach();
        Some(out)
    }
}

/// Context for hosts without thread bookkeeping of their own: every thread
/// counts as attached and nothing is ever detached.
pub struct AttachedRuntime;

impl RuntimeContext for AttachedRuntime {
    fn is_attached(&self) -> bool {
        true
    }

    fn attach(&self) -> Result<()> {
        Ok(())
    }

    fn detach(&self) {}
}

thread_local! {
    static ENGINE_THREAD_REGISTERED: Cell<bool> = const { Cell::new(false) };
}

/// Registers the calling thread with the engine's thread bookkeeping exactly
/// once; later calls on the same thread are no-ops. The cache assumes the
/// single-engine-per-process discipline documented on `VoipBridge`.
pub fn ensure_engine_thread(engine: &dyn SipEngine) {
    ENGINE_THREAD_REGISTERED.with(|registered| {
        if !registered.get() {
            let name = format!("{:?}", std::thread::current().id());
            engine.register_thread(&name);
            registered.set(true);
        }
    });
}
