//! Domain error types

use crate::session::status::SessionStatus;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A caller asked for a phase change the transition table does not allow.
    ///
    /// This is always a logic error in the caller and must propagate.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Agent not found in session roster: {0}")]
    AgentNotFound(String),

    #[error("Only the raiser of {issue_id} may withdraw it, not {agent_id}")]
    NotRaiser { issue_id: String, agent_id: String },

    #[error("Unknown opinion action: {0}")]
    UnknownAction(String),

    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("Invalid finding: {0}")]
    InvalidFinding(String),
}

impl DomainError {
    /// Check if this error is a state-machine violation
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::InvalidTransition { .. })
    }
}
