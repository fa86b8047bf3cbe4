//! Session store port
//!
//! The store is the sole owner of mutable session records. The engine does
//! read-modify-write through [`SharedSession`] and never holds the lock
//! across an `.await`.

use council_domain::Session;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// A session record shared between the store and the engine
pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),
}

pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Result<SharedSession, StoreError>;
}

/// Lock a session, recovering the guard if a previous holder panicked.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}
