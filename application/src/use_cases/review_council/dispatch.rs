//! Launching agent invocations, retrying faults and settling outcomes.

use super::types::{Dispatch, OrchestrationError, SessionRuntime};
use super::ReviewOrchestrator;
use crate::ports::agent_trigger::{AgentTrigger, TriggerError};
use crate::ports::conversation_logger::ConversationEvent;
use crate::ports::session_store::lock_session;
use council_domain::{
    AgentStatus, Session, Submission, TaskKind, TriggerResult, parse_submission,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ReviewOrchestrator {
    /// Hand dispatches to the session's task supervisor.
    pub(super) fn launch(&self, session_id: &str, dispatches: Vec<Dispatch>) {
        if dispatches.is_empty() {
            return;
        }
        let Some(runtime) = self.runtime(session_id) else {
            debug!(
                session = session_id,
                "Session closed; dropping {} dispatch(es)",
                dispatches.len()
            );
            return;
        };

        for dispatch in dispatches {
            let label = format!("{}:{}", dispatch.task, dispatch.agent.id);
            let this = self.clone();
            let session_id = session_id.to_string();
            let task_runtime = Arc::clone(&runtime);
            runtime.supervisor.spawn(label, async move {
                this.run_dispatch(&session_id, &task_runtime, dispatch).await
            });
        }
    }

    async fn run_dispatch(
        &self,
        session_id: &str,
        runtime: &SessionRuntime,
        dispatch: Dispatch,
    ) -> Result<(), OrchestrationError> {
        let agent_id = dispatch.agent.id.as_str();
        let outcome = match runtime.triggers.get(agent_id).cloned() {
            Some(trigger) => {
                self.invoke_with_retry(session_id, runtime, trigger.as_ref(), &dispatch)
                    .await
            }
            None => Err(TriggerError::Fault(format!("no trigger for agent {agent_id}"))),
        };

        // A submission embedded in the output counts before the "did it submit" check
        if let Ok(result) = &outcome
            && result.success
            && self.params.ingest_output_submissions
        {
            self.ingest_output(session_id, agent_id, dispatch.task, &result.output);
        }

        let follow_up = self.settle(session_id, runtime, &dispatch, &outcome)?;
        self.launch(session_id, follow_up);
        Ok(())
    }

    /// Invoke the trigger, retrying only unexpected faults.
    ///
    /// A structured failure (`Ok` with `success == false`) is returned as is.
    async fn invoke_with_retry(
        &self,
        session_id: &str,
        runtime: &SessionRuntime,
        trigger: &dyn AgentTrigger,
        dispatch: &Dispatch,
    ) -> Result<TriggerResult, TriggerError> {
        let agent_id = dispatch.agent.id.as_str();
        let max_attempts = self.params.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.logger.log(ConversationEvent::new(
                "trigger_invoked",
                json!({
                    "session_id": session_id,
                    "agent_id": agent_id,
                    "kind": trigger.kind().as_str(),
                    "task": dispatch.task.as_str(),
                    "attempt": attempt,
                    "prompt_bytes": dispatch.prompt.len(),
                }),
            ));

            match self.invoke_once(runtime, trigger, dispatch).await {
                Ok(result) => {
                    self.logger.log(ConversationEvent::new(
                        "trigger_result",
                        json!({
                            "session_id": session_id,
                            "agent_id": agent_id,
                            "task": dispatch.task.as_str(),
                            "success": result.success,
                            "failure": result.failure.map(|k| k.as_str()),
                            "error": result.error,
                            "command": result.command,
                            "output_bytes": result.output.len(),
                        }),
                    ));
                    return Ok(result);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.params.retry_delay(attempt);
                    warn!(
                        session = session_id,
                        agent = agent_id,
                        "Attempt {}/{} faulted, retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        session = session_id,
                        agent = agent_id,
                        "Giving up after {} attempt(s): {}",
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn invoke_once(
        &self,
        runtime: &SessionRuntime,
        trigger: &dyn AgentTrigger,
        dispatch: &Dispatch,
    ) -> Result<TriggerResult, TriggerError> {
        let agent_id = dispatch.agent.id.as_str();
        let token = match runtime.token(agent_id) {
            Some(token) => token,
            None => {
                let created = trigger.create_session(agent_id).await?;
                runtime.set_token(agent_id, created.clone());
                // Another invocation may have won the race
                runtime.token(agent_id).unwrap_or(created)
            }
        };
        trigger
            .send_prompt(&token, &dispatch.agent, &dispatch.prompt, self.activity.as_ref())
            .await
    }

    /// Submit whatever JSON submission the agent left in its output.
    fn ingest_output(&self, session_id: &str, agent_id: &str, task: TaskKind, output: &str) {
        let Some(submission) = parse_submission(output) else {
            debug!(session = session_id, agent = agent_id, "No submission found in output");
            return;
        };

        let outcome = match (task, submission) {
            (TaskKind::Review, Submission::Review(review)) => self
                .on_review_submitted(session_id, agent_id, review)
                .map(|_| ()),
            (TaskKind::Review, Submission::Opinions(_)) => {
                debug!(session = session_id, agent = agent_id, "Ignoring opinions in review output");
                return;
            }
            (_, Submission::Opinions(opinions)) => {
                self.on_opinion_submitted(session_id, agent_id, opinions)
            }
            (_, Submission::Review(_)) => {
                debug!(session = session_id, agent = agent_id, "Ignoring review in {} output", task);
                return;
            }
        };

        if let Err(e) = outcome {
            warn!(
                session = session_id,
                agent = agent_id,
                "Submission parsed from output was rejected: {}",
                e
            );
        }
    }

    /// Record how an invocation ended and re-evaluate the phase.
    fn settle(
        &self,
        session_id: &str,
        runtime: &SessionRuntime,
        dispatch: &Dispatch,
        outcome: &Result<TriggerResult, TriggerError>,
    ) -> Result<Vec<Dispatch>, OrchestrationError> {
        let agent_id = dispatch.agent.id.as_str();
        runtime.finish(agent_id);

        let shared = self.session(session_id)?;
        let mut session = lock_session(&shared);

        if let Ok(result) = outcome {
            if let Some(external) = result.session_id.as_deref()
                && session.remember_process_session(agent_id, external)
            {
                debug!(session = session_id, agent = agent_id, "Resumable session {}", external);
            }
            session.agent_state_mut(agent_id).record_output(&result.output);
        }

        let submitted = match dispatch.task {
            TaskKind::Review => session.has_submitted_review(agent_id),
            _ => session
                .agent_states
                .get(agent_id)
                .is_some_and(|s| s.status == AgentStatus::Submitted),
        };

        if !submitted {
            if dispatch.task == TaskKind::Review {
                session.record_review_failure(agent_id);
            }
            // A newer invocation owns the agent state now
            if runtime.is_current(agent_id, dispatch.generation) {
                self.record_miss(&mut session, dispatch, outcome);
            }
        }

        self.evaluate(&mut session, runtime)
    }

    fn record_miss(
        &self,
        session: &mut Session,
        dispatch: &Dispatch,
        outcome: &Result<TriggerResult, TriggerError>,
    ) {
        let agent_id = dispatch.agent.id.as_str();
        let state = session.agent_state_mut(agent_id);
        match outcome {
            Err(e) => {
                let error = e.to_string();
                state.fail("retries exhausted", Some(&error));
            }
            Ok(result) if !result.success => {
                state.fail(result.failure_reason(), result.error.as_deref());
            }
            Ok(_) if dispatch.task == TaskKind::Review => {
                state.fail("finished without submitting a review", None);
            }
            Ok(_) => {
                state.wait(format!("finished {} without submitting", dispatch.task));
            }
        }

        let status = state.status;
        let reason = state.last_reason.clone().unwrap_or_default();
        if status == AgentStatus::Failed {
            warn!(session = %session.id, agent = agent_id, "Agent failed: {}", reason);
        } else {
            info!(session = %session.id, agent = agent_id, "Agent missed the round: {}", reason);
        }
        self.publish_agent_status(session, agent_id);
    }
}
