//! Domain layer for review-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Council
//!
//! Several independent AI coding agents review the same diff, then deliberate
//! over each other's findings until a quorum of first votes settles every
//! issue:
//!
//! - **Review**: each enabled agent submits findings ([`RawFinding`])
//! - **Dedup**: near-duplicate findings collapse into one [`Issue`] ([`quorum::dedup`])
//! - **Deliberation**: agents add [`Opinion`]s until [`quorum::consensus`] settles each issue
//! - **Fix / Verify**: issues requiring a fix are verified by the council
//!
//! ## Session state machine
//!
//! [`Session`] owns the workflow status ([`SessionStatus`]); every change goes
//! through [`Session::transition`], which rejects anything outside the table.

pub mod agent;
pub mod core;
pub mod issue;
pub mod quorum;
pub mod session;
pub mod trigger;

// Re-export commonly used types
pub use agent::{AgentKind, AgentState, AgentStatus, ModelConfig, Strictness, TaskKind};
pub use core::error::DomainError;
pub use issue::{
    ConsensusType, Issue, Opinion, OpinionAction, OpinionInput, RawFinding, ReviewSubmission,
    Severity, normalize_action,
};
pub use quorum::{
    Submission, VoteTally, apply_consensus, check_consensus, deduplicate,
    determine_final_severity, parse_submission, title_similarity, titles_similar,
};
pub use session::{ReviewOutcome, Session, SessionConfig, SessionStatus};
pub use trigger::{FailureKind, TriggerResult};
