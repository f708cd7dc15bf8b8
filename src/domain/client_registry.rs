//! Concurrent map of live sessions.
//!
//! [`ClientRegistry`] is written only by [`crate::service::WsServer`]: an
//! insert on accept and a remove from each session's close hook. Any task
//! may read it concurrently. The lock is synchronous because removal runs
//! inside a close handler, and it is never held across an `.await` or while
//! handlers run.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ClientSummary, SessionId};
use crate::ws::Session;

/// Live sessions keyed by [`SessionId`].
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<SessionId, Session>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. Returns `false` if the id was already present
    /// (should never happen with UUID v4); the existing entry is kept.
    pub(crate) fn insert(&self, session: Session) -> bool {
        let mut map = self.clients.write();
        if map.contains_key(&session.id()) {
            tracing::warn!(session_id = %session.id(), "duplicate session id");
            return false;
        }
        map.insert(session.id(), session);
        true
    }

    /// Removes a session, returning it if it was registered.
    pub(crate) fn remove(&self, id: SessionId) -> Option<Session> {
        self.clients.write().remove(&id)
    }

    /// Returns the session with the given id.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.clients.read().get(&id).cloned()
    }

    /// Returns `true` if a session with the given id is registered.
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Returns the ids of all registered sessions, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.clients.read().keys().copied().collect()
    }

    /// Returns handles to all registered sessions.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.clients.read().values().cloned().collect()
    }

    /// Returns a summary of every registered session.
    #[must_use]
    pub fn list(&self) -> Vec<ClientSummary> {
        self.sessions().iter().map(Session::summary).collect()
    }

    /// Returns the number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns `true` if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}
