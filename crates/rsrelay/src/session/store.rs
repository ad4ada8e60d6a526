//! Session storage.
//!
//! The relay core never touches a store; only the caller surface loads a
//! [`Session`] before a call and saves it afterwards.

use async_trait::async_trait;
use dashmap::DashMap;

use super::Session;

/// Storage interface for per-user sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session by id. Returns `None` if it was never established or
    /// has been cleared.
    async fn get(&self, session_id: &str) -> Option<Session>;

    /// Insert or replace a session.
    async fn set(&self, session: Session);

    /// Remove a session. Returns whether it existed.
    async fn clear(&self, session_id: &str) -> bool;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    async fn set(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    async fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }
}
