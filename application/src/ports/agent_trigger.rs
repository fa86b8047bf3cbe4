//! Agent trigger port
//!
//! Defines the interface for launching and talking to one kind of external
//! review agent (a CLI program run as a subprocess).

use async_trait::async_trait;
use council_domain::{AgentKind, ModelConfig, TriggerResult};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Unexpected faults raised while invoking an agent.
///
/// These are the only trigger errors the engine retries. An agent program
/// that runs and reports failure is not an error here: it comes back as
/// `Ok(TriggerResult { success: false, .. })`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Trigger closed")]
    Closed,

    #[error("Unexpected fault: {0}")]
    Fault(String),
}

/// One tool-use event observed in an agent's streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentActivity {
    pub agent_id: String,
    /// Normalized action, e.g. `read`, `search`, `list`, `run`
    pub action: String,
    pub target: String,
}

/// Best-effort sink for [`AgentActivity`] notifications.
///
/// A panicking callback is caught and logged; it never aborts the stream
/// that produced the event.
#[derive(Clone)]
pub struct ActivitySink {
    callback: Arc<dyn Fn(&AgentActivity) + Send + Sync>,
}

impl ActivitySink {
    pub fn new(callback: impl Fn(&AgentActivity) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn notify(&self, agent_id: &str, action: &str, target: &str) {
        let activity = AgentActivity {
            agent_id: agent_id.to_string(),
            action: action.to_string(),
            target: target.to_string(),
        };
        if catch_unwind(AssertUnwindSafe(|| (self.callback)(&activity))).is_err() {
            warn!(agent = agent_id, action, "Activity callback panicked; ignoring");
        }
    }
}

impl std::fmt::Debug for ActivitySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivitySink").finish_non_exhaustive()
    }
}

/// Launches one kind of external agent CLI.
///
/// Implementations live in the infrastructure layer; the engine only ever
/// sees `Arc<dyn AgentTrigger>` and never branches on the concrete kind.
#[async_trait]
pub trait AgentTrigger: Send + Sync {
    /// Which agent kind this trigger services
    fn kind(&self) -> AgentKind;

    /// Open a conversation for `agent_id` and return its token.
    ///
    /// The token is passed back to every later [`send_prompt`](Self::send_prompt)
    /// for the same agent so multi-turn deliberation can resume the external
    /// program's own session once one is known.
    async fn create_session(&self, agent_id: &str) -> Result<String, TriggerError>;

    /// Run the agent program once with `prompt`.
    ///
    /// Expected failures (missing program, timeout, fatal stderr, non-zero
    /// exit) are reported through [`TriggerResult::failure`].
    async fn send_prompt(
        &self,
        token: &str,
        agent: &ModelConfig,
        prompt: &str,
        activity: Option<&ActivitySink>,
    ) -> Result<TriggerResult, TriggerError>;

    /// Terminate every process this trigger still tracks.
    async fn close(&self);
}

/// Builds the trigger for a configured agent.
pub trait TriggerFactory: Send + Sync {
    fn create(&self, agent: &ModelConfig) -> Arc<dyn AgentTrigger>;
}
