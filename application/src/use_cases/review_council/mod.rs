//! Review council use case
//!
//! Drives one review session through its workflow. Phase changes go through
//! the session's transition table and happen in response to submissions and
//! finished agent invocations, never on a timer:
//!
//! | Phase         | Entered when                                   | Agents prompted           |
//! |---------------|------------------------------------------------|---------------------------|
//! | Collecting    | [`begin_collecting`](ReviewOrchestrator::begin_collecting) | none        |
//! | Reviewing     | [`start_review`](ReviewOrchestrator::start_review) | every enabled agent   |
//! | Dedup         | every review attempt has resolved              | none                      |
//! | Deliberating  | at least one issue is undecided                | agents with pending issues |
//! | Fixing        | deliberation ended with fix-required issues    | none                      |
//! | Verifying     | [`mark_fix_complete`](ReviewOrchestrator::mark_fix_complete) | reporters of fix-required issues |
//! | Complete      | nothing left to decide, fix or verify          | none                      |
//!
//! All trigger instances and background tasks are held per session, so two
//! sessions with the same agent ids never touch each other's processes.

mod deliberation;
mod dispatch;
mod review;
mod types;
mod verification;


pub use types::OrchestrationError;

use types::{Dispatch, SessionRuntime};

use crate::config::OrchestrationParams;
use crate::ports::agent_trigger::{ActivitySink, TriggerFactory};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::event_publisher::{EventPublisher, NoEventPublisher, events};
use crate::ports::prompt_builder::{PromptBuilder, PromptRequest};
use crate::ports::session_store::{SessionStore, SharedSession, lock_session};
use council_domain::{
    AgentState, AgentStatus, Issue, ModelConfig, Session, SessionStatus, TaskKind,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// The orchestration engine.
///
/// Cheap to clone; clones share the same per-session runtimes.
#[derive(Clone)]
pub struct ReviewOrchestrator {
    store: Arc<dyn SessionStore>,
    factory: Arc<dyn TriggerFactory>,
    prompts: Arc<dyn PromptBuilder>,
    publisher: Arc<dyn EventPublisher>,
    logger: Arc<dyn ConversationLogger>,
    activity: Option<ActivitySink>,
    params: OrchestrationParams,
    runtimes: Arc<Mutex<HashMap<String, Arc<SessionRuntime>>>>,
}

impl ReviewOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        factory: Arc<dyn TriggerFactory>,
        prompts: Arc<dyn PromptBuilder>,
    ) -> Self {
        Self {
            store,
            factory,
            prompts,
            publisher: Arc::new(NoEventPublisher),
            logger: Arc::new(NoConversationLogger),
            activity: None,
            params: OrchestrationParams::default(),
            runtimes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_activity_sink(mut self, sink: ActivitySink) -> Self {
        self.activity = Some(sink);
        self
    }

    pub fn with_params(mut self, params: OrchestrationParams) -> Self {
        self.params = params;
        self
    }

    // ==================== Workflow Entry Points ====================

    /// IDLE → COLLECTING: attach the change under review to the session.
    pub fn begin_collecting(
        &self,
        session_id: &str,
        diff: impl Into<String>,
    ) -> Result<(), OrchestrationError> {
        let shared = self.session(session_id)?;
        let mut session = lock_session(&shared);
        self.transition(&mut session, SessionStatus::Collecting)?;
        session.diff = Some(diff.into());
        Ok(())
    }

    /// COLLECTING → REVIEWING: prompt every enabled agent for a review.
    ///
    /// Disabled agents get no trigger and no state entry. Must be called from
    /// within a Tokio runtime; invocations run as supervised background tasks.
    pub fn start_review(&self, session_id: &str) -> Result<(), OrchestrationError> {
        let shared = self.session(session_id)?;

        let (runtime, dispatches) = {
            let mut session = lock_session(&shared);
            self.transition(&mut session, SessionStatus::Reviewing)?;

            let roster: Vec<ModelConfig> = session.enabled_agents().cloned().collect();
            let triggers = roster
                .iter()
                .map(|agent| (agent.id.clone(), self.factory.create(agent)))
                .collect();
            let runtime = Arc::new(SessionRuntime::new(session_id, triggers));

            let diff = session.diff.clone();
            let mut dispatches = Vec::with_capacity(roster.len());
            for agent in &roster {
                let request = PromptRequest::Review {
                    diff: diff.as_deref(),
                };
                let prompt = self.prompts.build(session_id, agent, &request);
                dispatches.push(self.prepare(
                    &runtime,
                    &mut session,
                    agent,
                    TaskKind::Review,
                    prompt,
                ));
            }
            info!(
                session = session_id,
                "Review started with {} agent(s)",
                dispatches.len()
            );

            // An empty roster resolves the review gate immediately
            dispatches.extend(self.check_review_gate(&mut session, &runtime)?);
            (runtime, dispatches)
        };

        self.runtimes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), runtime);
        self.launch(session_id, dispatches);
        Ok(())
    }

    /// Cancel the session's in-flight tasks and close its triggers.
    ///
    /// The session record stays in the store for reporting.
    pub async fn close_session(&self, session_id: &str) {
        let runtime = self
            .runtimes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        let Some(runtime) = runtime else {
            debug!(session = session_id, "No runtime to close");
            return;
        };

        runtime.supervisor.cancel_all().await;
        for (agent_id, trigger) in &runtime.triggers {
            debug!(session = session_id, agent = %agent_id, "Closing trigger");
            trigger.close().await;
        }
        info!(session = session_id, "Session closed");
    }

    /// Wait until the session has no background work left.
    pub async fn wait_for_tasks(&self, session_id: &str) {
        if let Some(runtime) = self.runtime(session_id) {
            runtime.supervisor.wait_all().await;
        }
    }

    // ==================== Snapshots ====================

    pub fn status(&self, session_id: &str) -> Result<SessionStatus, OrchestrationError> {
        let shared = self.session(session_id)?;
        Ok(lock_session(&shared).status())
    }

    pub fn agent_states(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<String, AgentState>, OrchestrationError> {
        let shared = self.session(session_id)?;
        Ok(lock_session(&shared).agent_states.clone())
    }

    pub fn issues(&self, session_id: &str) -> Result<Vec<Issue>, OrchestrationError> {
        let shared = self.session(session_id)?;
        Ok(lock_session(&shared).issues.clone())
    }

    // ==================== Shared Helpers ====================

    fn session(&self, session_id: &str) -> Result<SharedSession, OrchestrationError> {
        Ok(self.store.get(session_id)?)
    }

    fn runtime(&self, session_id: &str) -> Option<Arc<SessionRuntime>> {
        self.runtimes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    fn require_runtime(&self, session_id: &str) -> Result<Arc<SessionRuntime>, OrchestrationError> {
        self.runtime(session_id)
            .ok_or_else(|| OrchestrationError::NotStarted(session_id.to_string()))
    }

    /// The only call site that changes a session's status.
    fn transition(
        &self,
        session: &mut Session,
        target: SessionStatus,
    ) -> Result<(), OrchestrationError> {
        let from = session.transition(target)?;
        info!(session = %session.id, "Phase {} -> {}", from, target);
        let payload = json!({
            "session_id": session.id,
            "from": from.as_str(),
            "to": target.as_str(),
        });
        self.publisher.publish(events::PHASE_CHANGED, payload.clone());
        self.logger
            .log(ConversationEvent::new("phase_changed", payload));
        Ok(())
    }

    fn publish_agent_status(&self, session: &Session, agent_id: &str) {
        let Some(state) = session.agent_states.get(agent_id) else {
            return;
        };
        self.publisher.publish(
            events::AGENT_STATUS_CHANGED,
            json!({
                "session_id": session.id,
                "agent_id": agent_id,
                "status": state.status.as_str(),
                "reason": state.last_reason,
            }),
        );
        if state.status == AgentStatus::Failed {
            self.logger.log(ConversationEvent::new(
                "agent_failed",
                json!({
                    "session_id": session.id,
                    "agent_id": agent_id,
                    "reason": state.last_reason,
                    "error": state.last_error,
                }),
            ));
        }
    }

    fn publish_consensus(&self, session: &Session, settled: &[String]) {
        for issue in settled.iter().filter_map(|id| session.issue(id)) {
            info!(
                session = %session.id,
                issue = %issue.id,
                "Consensus reached: {}",
                issue.consensus_type.as_str()
            );
            self.publisher.publish(
                events::ISSUE_CONSENSUS,
                json!({
                    "session_id": session.id,
                    "issue_id": issue.id,
                    "consensus_type": issue.consensus_type.as_str(),
                }),
            );
        }
    }

    /// Mark `agent` as working on `task` and package the invocation.
    fn prepare(
        &self,
        runtime: &SessionRuntime,
        session: &mut Session,
        agent: &ModelConfig,
        task: TaskKind,
        prompt: String,
    ) -> Dispatch {
        let generation = runtime.begin(&agent.id);
        session.agent_state_mut(&agent.id).start(task);
        self.publish_agent_status(session, &agent.id);
        Dispatch {
            agent: agent.clone(),
            task,
            prompt,
            generation,
        }
    }

    /// Re-evaluate whatever the current phase is waiting on.
    fn evaluate(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
    ) -> Result<Vec<Dispatch>, OrchestrationError> {
        match session.status() {
            SessionStatus::Reviewing => self.check_review_gate(session, runtime),
            SessionStatus::Deliberating => self.advance_deliberation(session, runtime),
            SessionStatus::Verifying => {
                self.evaluate_verification(session, runtime)?;
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }
}
