//! Per-agent runtime state within a session.

use crate::core::string::truncate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bound on the observability strings kept per agent
const MAX_OBSERVED_LEN: usize = 4096;

/// Lifecycle status of one agent in one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    Waiting,
    Reviewing,
    Submitted,
    Failed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Waiting => "WAITING",
            AgentStatus::Reviewing => "REVIEWING",
            AgentStatus::Submitted => "SUBMITTED",
            AgentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of work an agent was last asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Review,
    Deliberation,
    Verification,
    /// Re-evaluation of a disputed issue by its raiser
    Dispute,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Review => "review",
            TaskKind::Deliberation => "deliberation",
            TaskKind::Verification => "verification",
            TaskKind::Dispute => "dispute",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime status of one agent; mutated only by the orchestration engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub task: Option<TaskKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_output: Option<String>,
    pub last_error: Option<String>,
    pub last_reason: Option<String>,
}

impl AgentState {
    /// Mark the agent as working on `task`.
    pub fn start(&mut self, task: TaskKind) {
        self.status = AgentStatus::Reviewing;
        self.task = Some(task);
        self.started_at = Some(Utc::now());
        self.completed_at = None;
        self.last_error = None;
        self.last_reason = None;
    }

    pub fn submitted(&mut self) {
        self.status = AgentStatus::Submitted;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: impl Into<String>, error: Option<&str>) {
        self.status = AgentStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.last_reason = Some(reason.into());
        self.last_error = error.map(|e| truncate(e, MAX_OBSERVED_LEN));
    }

    /// Soft miss: the agent finished without submitting, but that is not fatal.
    pub fn wait(&mut self, reason: impl Into<String>) {
        self.status = AgentStatus::Waiting;
        self.completed_at = Some(Utc::now());
        self.last_reason = Some(reason.into());
    }

    pub fn record_output(&mut self, output: &str) {
        if !output.is_empty() {
            self.last_output = Some(truncate(output, MAX_OBSERVED_LEN));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut state = AgentState::default();
        assert_eq!(state.status, AgentStatus::Waiting);

        state.start(TaskKind::Review);
        assert_eq!(state.status, AgentStatus::Reviewing);
        assert_eq!(state.task, Some(TaskKind::Review));
        assert!(state.started_at.is_some());

        state.fail("timeout", Some("killed after 600s"));
        assert_eq!(state.status, AgentStatus::Failed);
        assert_eq!(state.last_reason.as_deref(), Some("timeout"));
        assert!(state.completed_at.is_some());

        // Restart clears failure details
        state.start(TaskKind::Deliberation);
        assert!(state.last_error.is_none());
        assert!(state.completed_at.is_none());
    }

    #[test]
    fn test_output_is_bounded() {
        let mut state = AgentState::default();
        state.record_output(&"x".repeat(10_000));
        assert!(state.last_output.unwrap().len() <= MAX_OBSERVED_LEN);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&AgentStatus::Submitted).unwrap();
        assert_eq!(json, "\"SUBMITTED\"");
    }
}
