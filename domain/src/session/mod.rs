//! Review sessions and the workflow state machine

pub mod entities;
pub mod status;

pub use entities::{ReviewOutcome, Session, SessionConfig};
pub use status::SessionStatus;
