//! Review phase: collecting independent reviews, then dedup.

use super::types::{Dispatch, OrchestrationError, SessionRuntime};
use super::ReviewOrchestrator;
use crate::ports::conversation_logger::ConversationEvent;
use crate::ports::session_store::lock_session;
use council_domain::{
    DomainError, ReviewSubmission, Session, SessionStatus, apply_consensus, deduplicate,
};
use serde_json::json;
use tracing::info;

impl ReviewOrchestrator {
    /// Accept `agent_id`'s independent review.
    ///
    /// Returns the ids assigned to the new (pre-dedup) issues. When this
    /// resolves the last outstanding review attempt, the session moves on to
    /// dedup and deliberation.
    pub fn on_review_submitted(
        &self,
        session_id: &str,
        agent_id: &str,
        review: ReviewSubmission,
    ) -> Result<Vec<String>, OrchestrationError> {
        let shared = self.session(session_id)?;
        let runtime = self.require_runtime(session_id)?;

        let (created, follow_up) = {
            let mut session = lock_session(&shared);
            let status = session.status();
            if status != SessionStatus::Reviewing {
                return Err(OrchestrationError::WrongPhase {
                    operation: "submit_review",
                    status,
                });
            }
            if !session.agent(agent_id).is_some_and(|a| a.enabled) {
                return Err(DomainError::AgentNotFound(agent_id.to_string()).into());
            }
            if session.has_submitted_review(agent_id) {
                return Err(OrchestrationError::AlreadySubmitted(agent_id.to_string()));
            }

            let summary = review.summary.clone();
            let created = session.record_review(agent_id, review)?;
            session.agent_state_mut(agent_id).submitted();
            self.publish_agent_status(&session, agent_id);
            self.logger.log(ConversationEvent::new(
                "review_submitted",
                json!({
                    "session_id": session_id,
                    "agent_id": agent_id,
                    "issue_ids": created,
                    "summary": summary,
                }),
            ));
            info!(
                session = session_id,
                agent = agent_id,
                "Review submitted with {} finding(s)",
                created.len()
            );

            let follow_up = self.check_review_gate(&mut session, &runtime)?;
            (created, follow_up)
        };

        self.launch(session_id, follow_up);
        Ok(created)
    }

    /// Advance past REVIEWING once every enabled agent's review attempt has
    /// resolved, whether it submitted or failed.
    pub(super) fn check_review_gate(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
    ) -> Result<Vec<Dispatch>, OrchestrationError> {
        if session.status() != SessionStatus::Reviewing {
            return Ok(Vec::new());
        }
        let expected = session.enabled_agent_count();
        if session.resolved_review_count() < expected {
            return Ok(Vec::new());
        }

        self.transition(session, SessionStatus::Dedup)?;
        let raw = std::mem::take(&mut session.issues);
        let raw_count = raw.len();
        session.issues = deduplicate(raw);
        info!(
            session = %session.id,
            "Dedup: {} finding(s) -> {} issue(s)",
            raw_count,
            session.issues.len()
        );

        let settled = apply_consensus(&mut session.issues, session.config.consensus_threshold);
        self.publish_consensus(session, &settled);

        // Settled issues needing a fix still go through DELIBERATING, the only
        // phase that may enter FIXING; COMPLETE here would drop the fix loop.
        if session.all_issues_settled() && session.fix_required_issues().next().is_none() {
            self.transition(session, SessionStatus::Complete)?;
            return Ok(Vec::new());
        }

        self.transition(session, SessionStatus::Deliberating)?;
        session.turn = 1;
        let dispatches = self.open_round(session, runtime);
        if !dispatches.is_empty() {
            return Ok(dispatches);
        }
        self.advance_deliberation(session, runtime)
    }
}
