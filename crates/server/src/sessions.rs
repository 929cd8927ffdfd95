//! Registry of open SSE sessions.
//!
//! Each session pairs one event stream with the POSTed messages that carry its
//! id. The entry lives exactly as long as the stream: the [`SessionGuard`]
//! owned by the stream body removes it on drop.

use marketing_miner_mcp::protocol::JsonRpcResponse;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Opaque session key handed to the client in the `endpoint` event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending side of one session's event stream
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    outbound: mpsc::UnboundedSender<JsonRpcResponse>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Queue a message for the stream. False once the stream is gone.
    pub fn send(&self, message: JsonRpcResponse) -> bool {
        self.outbound.send(message).is_ok()
    }
}

/// Session map owned by the HTTP transport
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session under a fresh id
    pub fn open(
        self: &Arc<Self>,
    ) -> (SessionGuard, mpsc::UnboundedReceiver<JsonRpcResponse>) {
        let (outbound, inbound) = mpsc::unbounded_channel();
        let mut sessions = self.lock();

        let id = loop {
            let id = SessionId::new();
            if let Entry::Vacant(entry) = sessions.entry(id.clone()) {
                entry.insert(SessionHandle {
                    id: id.clone(),
                    outbound,
                });
                break id;
            }
        };

        info!(session_id = %id, open_sessions = sessions.len(), "Session opened");

        let guard = SessionGuard {
            id,
            registry: Arc::clone(self),
        };
        (guard, inbound)
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.lock().get(&SessionId(id.to_string())).cloned()
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Keeps a session registered; dropping it closes the session.
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            info!(session_id = %self.id, "Session closed");
        }
    }
}
