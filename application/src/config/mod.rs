//! Application-level configuration.
//!
//! - [`OrchestrationParams`]: retry policy and output ingestion for the engine

pub mod orchestration_params;

pub use orchestration_params::OrchestrationParams;
