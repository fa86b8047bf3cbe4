//! Notification port for external observers.
//!
//! Publishing is fire-and-forget: nothing is acknowledged or awaited, and a
//! publisher with no listeners silently drops events.

use serde::Serialize;
use serde_json::Value;

/// Event names published by the engine
pub mod events {
    /// `{session_id, from, to}`
    pub const PHASE_CHANGED: &str = "session.phase_changed";
    /// `{session_id, agent_id, status, reason}`
    pub const AGENT_STATUS_CHANGED: &str = "agent.status_changed";
    /// `{session_id, issue_id, consensus_type}`
    pub const ISSUE_CONSENSUS: &str = "issue.consensus";
}

/// A published event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouncilEvent {
    pub name: String,
    pub payload: Value,
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &str, payload: Value);
}

/// No-op publisher for tests and headless runs
pub struct NoEventPublisher;

impl EventPublisher for NoEventPublisher {
    fn publish(&self, _event: &str, _payload: Value) {}
}
