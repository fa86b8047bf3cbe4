//! Agent configuration and runtime state

pub mod model_config;
pub mod state;

pub use model_config::{AgentKind, ModelConfig, Strictness};
pub use state::{AgentState, AgentStatus, TaskKind};
