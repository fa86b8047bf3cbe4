//! Quorum algorithms over a session's issues
//!
//! - [`consensus`]: first-vote tallies, consensus and final severity
//! - [`dedup`]: merging near-duplicate findings from different agents
//! - [`parsing`]: recovering JSON submissions from free-form agent output
//!
//! All of these are pure functions over [`Issue`](crate::issue::Issue) data.

pub mod consensus;
pub mod dedup;
pub mod parsing;

pub use consensus::{VoteTally, apply_consensus, check_consensus, determine_final_severity};
pub use dedup::{deduplicate, title_similarity, titles_similar};
pub use parsing::{Submission, parse_submission};
