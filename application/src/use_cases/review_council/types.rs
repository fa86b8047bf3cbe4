//! Types shared by the review orchestrator's phase modules.

use crate::ports::agent_trigger::AgentTrigger;
use crate::ports::session_store::StoreError;
use crate::use_cases::task_supervisor::TaskSupervisor;
use council_domain::{DomainError, ModelConfig, SessionStatus, TaskKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by the review orchestrator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{operation} is not allowed while the session is {status}")]
    WrongPhase {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("Session {0} has no running council")]
    NotStarted(String),

    #[error("Agent {0} already submitted a review")]
    AlreadySubmitted(String),
}

impl OrchestrationError {
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, OrchestrationError::Domain(e) if e.is_invalid_transition())
    }
}

/// One agent invocation the engine decided to launch.
///
/// Dispatches are built while the session is locked and launched after
/// the lock is released.
#[derive(Debug, Clone)]
pub(super) struct Dispatch {
    pub agent: ModelConfig,
    pub task: TaskKind,
    pub prompt: String,
    /// Per-agent sequence number; a newer dispatch supersedes older ones
    pub generation: u64,
}

#[derive(Debug, Default)]
struct AgentSlot {
    in_flight: usize,
    generation: u64,
    token: Option<String>,
}

/// Per-session engine resources. Never shared between sessions.
pub(super) struct SessionRuntime {
    pub triggers: HashMap<String, Arc<dyn AgentTrigger>>,
    pub supervisor: TaskSupervisor,
    slots: Mutex<HashMap<String, AgentSlot>>,
}

impl SessionRuntime {
    pub fn new(session_id: &str, triggers: HashMap<String, Arc<dyn AgentTrigger>>) -> Self {
        Self {
            triggers,
            supervisor: TaskSupervisor::new(session_id),
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut HashMap<String, AgentSlot>) -> R) -> R {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut slots)
    }

    /// Register a new invocation for `agent_id` and return its generation.
    pub fn begin(&self, agent_id: &str) -> u64 {
        self.with_slots(|slots| {
            let slot = slots.entry(agent_id.to_string()).or_default();
            slot.in_flight += 1;
            slot.generation += 1;
            slot.generation
        })
    }

    pub fn finish(&self, agent_id: &str) {
        self.with_slots(|slots| {
            if let Some(slot) = slots.get_mut(agent_id) {
                slot.in_flight = slot.in_flight.saturating_sub(1);
            }
        })
    }

    pub fn is_in_flight(&self, agent_id: &str) -> bool {
        self.with_slots(|slots| slots.get(agent_id).is_some_and(|s| s.in_flight > 0))
    }

    /// Whether `generation` is still the latest invocation for `agent_id`.
    pub fn is_current(&self, agent_id: &str, generation: u64) -> bool {
        self.with_slots(|slots| slots.get(agent_id).is_some_and(|s| s.generation == generation))
    }

    pub fn token(&self, agent_id: &str) -> Option<String> {
        self.with_slots(|slots| slots.get(agent_id).and_then(|s| s.token.clone()))
    }

    pub fn set_token(&self, agent_id: &str, token: String) {
        self.with_slots(|slots| {
            slots.entry(agent_id.to_string()).or_default().token.get_or_insert(token);
        })
    }
}
