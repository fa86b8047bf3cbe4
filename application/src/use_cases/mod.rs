//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod review_council;
pub mod task_supervisor;
