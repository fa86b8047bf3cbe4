//! Result of one external agent invocation.

use serde::{Deserialize, Serialize};

/// Why an invocation failed.
///
/// None of these are retried by the trigger layer itself; the engine only
/// retries invocations that fault (see the application `TriggerError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The CLI program is not installed
    ProgramMissing,
    /// The process exceeded its time budget and was killed
    Timeout,
    /// A known-unrecoverable stderr signature was seen and the process was killed
    FatalPattern,
    /// The program ran and reported failure (non-zero exit or error event)
    ProcessFailed,
    /// The process could not be started for another reason
    LaunchFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProgramMissing => "program_missing",
            FailureKind::Timeout => "timeout",
            FailureKind::FatalPattern => "fatal_pattern",
            FailureKind::ProcessFailed => "process_failed",
            FailureKind::LaunchFailed => "launch_failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one worker invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// External process-session identifier, for resumption
    pub session_id: Option<String>,
    /// The literal command executed, for diagnostics
    pub command: Option<String>,
}

impl TriggerResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            failure: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Human-readable failure line for `AgentState::last_reason`
    pub fn failure_reason(&self) -> String {
        match (&self.failure, &self.error) {
            (Some(kind), Some(error)) => format!("{kind}: {error}"),
            (Some(kind), None) => kind.to_string(),
            (None, Some(error)) => error.clone(),
            (None, None) => "unknown failure".to_string(),
        }
    }
}
