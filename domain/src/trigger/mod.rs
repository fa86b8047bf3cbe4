//! Outcome types for external agent invocations

pub mod result;

pub use result::{FailureKind, TriggerResult};
