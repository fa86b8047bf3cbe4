//! Issues, opinions and the submission boundary

pub mod entities;
pub mod submission;

pub use entities::{ConsensusType, Issue, Opinion, OpinionAction, Severity};
pub use submission::{OpinionInput, RawFinding, ReviewSubmission, normalize_action};
