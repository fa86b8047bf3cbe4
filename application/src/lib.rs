//! Application layer for review-council
//!
//! This crate contains the orchestration engine, port definitions, and
//! engine configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::OrchestrationParams;
pub use ports::{
    agent_trigger::{ActivitySink, AgentActivity, AgentTrigger, TriggerError, TriggerFactory},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    event_publisher::{CouncilEvent, EventPublisher, NoEventPublisher, events},
    prompt_builder::{PromptBuilder, PromptRequest},
    session_store::{SessionStore, SharedSession, StoreError, lock_session},
};
pub use use_cases::review_council::{OrchestrationError, ReviewOrchestrator};
pub use use_cases::task_supervisor::TaskSupervisor;
