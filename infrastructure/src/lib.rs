//! Infrastructure layer for review-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: agent CLI triggers, the session store,
//! event and conversation sinks, prompts, and configuration file loading.

pub mod config;
pub mod logging;
pub mod prompt;
pub mod publisher;
pub mod store;
pub mod trigger;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigWarning, FileAgentEntry, FileConfig};
pub use logging::JsonlConversationLogger;
pub use prompt::DefaultPromptBuilder;
pub use publisher::BroadcastEventPublisher;
pub use store::InMemorySessionStore;
pub use trigger::{CliTriggerFactory, TriggerSettings};
