//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod agent_trigger;
pub mod conversation_logger;
pub mod event_publisher;
pub mod prompt_builder;
pub mod session_store;
