//! In-memory session store.

use council_application::ports::session_store::{SessionStore, SharedSession, StoreError};
use council_domain::{Session, SessionConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Process-lifetime store; sessions live until removed.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SharedSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an IDLE session under `id`.
    pub fn create(&self, id: &str, config: SessionConfig) -> Result<SharedSession, StoreError> {
        let mut sessions = self.sessions();
        if sessions.contains_key(id) {
            return Err(StoreError::SessionExists(id.to_string()));
        }
        let shared = Arc::new(Mutex::new(Session::new(id, config)));
        sessions.insert(id.to_string(), Arc::clone(&shared));
        debug!(session = id, "Session created");
        Ok(shared)
    }

    pub fn remove(&self, id: &str) -> Option<SharedSession> {
        self.sessions().remove(id)
    }

    /// Session ids, sorted
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Result<SharedSession, StoreError> {
        self.sessions()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }
}
