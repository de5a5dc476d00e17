use std::sync::Arc;

use parking_lot::Mutex;
use soulflow_core_types::{Flow, Snapshot};

use crate::session::EditSession;

/// Cloneable handle to one session. Callers are serialized through the lock
/// so every change still goes through a session operation.
#[derive(Debug, Clone, Default)]
pub struct SharedEditSession {
    inner: Arc<Mutex<EditSession>>,
}

impl SharedEditSession {
    pub fn new(session: EditSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn from_flow(flow: &Flow) -> Self {
        Self::new(EditSession::from_flow(flow))
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut EditSession) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    pub fn export_flow(&self) -> Flow {
        self.inner.lock().export_flow()
    }
}
