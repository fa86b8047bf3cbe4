//! Session workflow status and the transition table.
//!
//! The table in [`SessionStatus::allowed_targets`] is the single authority
//! for phase ordering:
//!
//! ```text
//! idle ─▶ collecting ─▶ reviewing ─▶ dedup ─┬─▶ deliberating ◀─┐ (self loop)
//!                                           │        │  │      │
//!                                           │        │  └──────┘
//!                                           │        ├─▶ agent_response (legacy) ─▶ deliberating
//!                                           │        ▼
//!                                           │     fixing ◀─▶ verifying
//!                                           ▼        │          │
//!                                        complete ◀──┴──────────┘
//! ```
//!
//! `complete` is terminal. Only `deliberating` may transition to itself.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Workflow phase of a review session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, nothing collected yet
    #[default]
    Idle,
    /// Change under review is being collected
    Collecting,
    /// Agents are writing independent reviews
    Reviewing,
    /// Raw findings are being merged
    Dedup,
    /// Agents cross-examine each other's issues
    Deliberating,
    /// Accepted fixes are being applied
    Fixing,
    /// Original reporters confirm fixes
    Verifying,
    /// Legacy single-agent response phase, kept for older sessions
    AgentResponse,
    /// Terminal
    Complete,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 9] = [
        SessionStatus::Idle,
        SessionStatus::Collecting,
        SessionStatus::Reviewing,
        SessionStatus::Dedup,
        SessionStatus::Deliberating,
        SessionStatus::Fixing,
        SessionStatus::Verifying,
        SessionStatus::AgentResponse,
        SessionStatus::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Collecting => "collecting",
            SessionStatus::Reviewing => "reviewing",
            SessionStatus::Dedup => "dedup",
            SessionStatus::Deliberating => "deliberating",
            SessionStatus::Fixing => "fixing",
            SessionStatus::Verifying => "verifying",
            SessionStatus::AgentResponse => "agent_response",
            SessionStatus::Complete => "complete",
        }
    }

    /// Legal targets from this status.
    pub fn allowed_targets(&self) -> &'static [SessionStatus] {
        use SessionStatus::*;
        match self {
            Idle => &[Collecting],
            Collecting => &[Reviewing],
            Reviewing => &[Dedup],
            Dedup => &[Deliberating, Complete],
            Deliberating => &[Deliberating, Fixing, AgentResponse, Complete],
            AgentResponse => &[Deliberating, Complete],
            Fixing => &[Verifying, Complete],
            Verifying => &[Fixing, Complete],
            Complete => &[],
        }
    }

    /// Whether moving from `self` to `target` is legal.
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Validate a transition, returning the target on success.
    pub fn transition_to(&self, target: SessionStatus) -> Result<SessionStatus, DomainError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown session status: {s}"))
    }
}
