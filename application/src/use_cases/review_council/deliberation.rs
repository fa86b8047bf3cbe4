//! Deliberation rounds, opinion intake and the dispute sub-protocol.

use super::types::{Dispatch, OrchestrationError, SessionRuntime};
use super::ReviewOrchestrator;
use crate::ports::conversation_logger::ConversationEvent;
use crate::ports::prompt_builder::PromptRequest;
use crate::ports::session_store::lock_session;
use council_domain::{
    DomainError, Issue, ModelConfig, Opinion, OpinionAction, OpinionInput, Session,
    SessionStatus, TaskKind, apply_consensus,
};
use serde_json::json;
use tracing::{debug, info};

impl ReviewOrchestrator {
    /// Accept a batch of opinions from `agent_id`.
    ///
    /// The batch is validated as a whole: an unknown issue id or action, or a
    /// `withdraw` on another agent's issue, rejects every entry. While deliberating, consensus is re-applied and
    /// the round may advance; while verifying, the answers of each issue's
    /// original reporter decide whether the fix holds.
    pub fn on_opinion_submitted(
        &self,
        session_id: &str,
        agent_id: &str,
        opinions: Vec<OpinionInput>,
    ) -> Result<(), OrchestrationError> {
        let shared = self.session(session_id)?;
        let runtime = self.require_runtime(session_id)?;

        let dispatches = {
            let mut session = lock_session(&shared);
            let status = session.status();
            if !matches!(
                status,
                SessionStatus::Deliberating | SessionStatus::Verifying
            ) {
                return Err(OrchestrationError::WrongPhase {
                    operation: "submit_opinion",
                    status,
                });
            }
            if !session.agent(agent_id).is_some_and(|a| a.enabled) {
                return Err(DomainError::AgentNotFound(agent_id.to_string()).into());
            }

            let mut accepted = Vec::with_capacity(opinions.len());
            for input in opinions {
                let issue = session
                    .issue(&input.issue_id)
                    .ok_or_else(|| DomainError::IssueNotFound(input.issue_id.clone()))?;
                let (turn, own_issue) = (issue.turn, issue.raised_by == agent_id);
                let issue_id = input.issue_id.clone();
                let opinion = input.into_opinion(agent_id, turn)?;
                if opinion.action == OpinionAction::Withdraw && !own_issue {
                    return Err(DomainError::NotRaiser {
                        issue_id,
                        agent_id: agent_id.to_string(),
                    }
                    .into());
                }
                accepted.push((issue_id, opinion));
            }

            if status == SessionStatus::Verifying {
                self.record_verification(&mut session, &runtime, agent_id, accepted)?;
                Vec::new()
            } else {
                self.record_deliberation(&mut session, &runtime, agent_id, accepted)?
            }
        };

        self.launch(session_id, dispatches);
        Ok(())
    }

    fn record_deliberation(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
        agent_id: &str,
        accepted: Vec<(String, Opinion)>,
    ) -> Result<Vec<Dispatch>, OrchestrationError> {
        let mut disputes = Vec::new();

        for (issue_id, opinion) in accepted {
            self.log_opinion(&session.id, agent_id, &issue_id, &opinion);
            let issue = session.issue_mut(&issue_id)?;
            let own_issue = issue.raised_by == agent_id;
            let action = opinion.action;
            let reasoning = opinion.reasoning.clone();
            issue.push_opinion(opinion);

            match action {
                OpinionAction::Withdraw => {
                    issue.close_withdrawn();
                    info!(session = %session.id, issue = %issue_id, "Issue withdrawn by its raiser");
                }
                OpinionAction::FalsePositive if !own_issue && !issue.is_closed() => {
                    disputes.push((issue_id, reasoning));
                }
                _ => {}
            }
        }

        session.agent_state_mut(agent_id).submitted();
        self.publish_agent_status(session, agent_id);

        let settled = apply_consensus(&mut session.issues, session.config.consensus_threshold);
        self.publish_consensus(session, &settled);

        // Disputes go out first so the raiser counts as busy for this round
        let mut dispatches = self.open_disputes(session, runtime, agent_id, disputes);
        dispatches.extend(self.advance_deliberation(session, runtime)?);
        Ok(dispatches)
    }

    fn log_opinion(&self, session_id: &str, agent_id: &str, issue_id: &str, opinion: &Opinion) {
        debug!(
            session = session_id,
            agent = agent_id,
            issue = issue_id,
            "Opinion: {}",
            opinion.action.as_str()
        );
        self.logger.log(ConversationEvent::new(
            "opinion_submitted",
            json!({
                "session_id": session_id,
                "agent_id": agent_id,
                "issue_id": issue_id,
                "action": opinion.action.as_str(),
                "reasoning": opinion.reasoning,
                "suggested_severity": opinion.suggested_severity.map(|s| s.as_str()),
                "turn": opinion.turn,
            }),
        ));
    }

    /// Ask the raiser of each disputed issue, and only the raiser, to re-evaluate it.
    fn open_disputes(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
        disputed_by: &str,
        disputes: Vec<(String, String)>,
    ) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        for (issue_id, reasoning) in disputes {
            let Some(issue) = session.issue(&issue_id).cloned() else {
                continue;
            };
            let Some(raiser) = self.deliberator(session, &issue.raised_by) else {
                debug!(session = %session.id, issue = %issue_id, "Raiser unavailable; dispute not sent");
                continue;
            };
            info!(
                session = %session.id,
                issue = %issue_id,
                "{} disputes {}'s issue as a false positive",
                disputed_by,
                raiser.id
            );
            let request = PromptRequest::Dispute {
                issue: &issue,
                disputed_by,
                reasoning: &reasoning,
            };
            let prompt = self.prompts.build(&session.id, &raiser, &request);
            dispatches.push(self.prepare(runtime, session, &raiser, TaskKind::Dispute, prompt));
        }
        dispatches
    }

    /// Agents taking part in deliberation: enabled and with a submitted review.
    fn deliberators(&self, session: &Session) -> Vec<ModelConfig> {
        session
            .enabled_agents()
            .filter(|a| session.has_submitted_review(&a.id))
            .cloned()
            .collect()
    }

    fn deliberator(&self, session: &Session, agent_id: &str) -> Option<ModelConfig> {
        self.deliberators(session)
            .into_iter()
            .find(|a| a.id == agent_id)
    }

    /// Prompt every deliberator that owes an opinion in the current turn.
    pub(super) fn open_round(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
    ) -> Vec<Dispatch> {
        let turn = session.turn;
        let mut dispatches = Vec::new();
        for agent in self.deliberators(session) {
            let pending: Vec<Issue> = session
                .pending_issues_for(&agent.id)
                .into_iter()
                .cloned()
                .collect();
            if pending.is_empty() {
                continue;
            }
            let request = PromptRequest::Deliberation {
                turn,
                issues: &pending,
            };
            let prompt = self.prompts.build(&session.id, &agent, &request);
            dispatches.push(self.prepare(runtime, session, &agent, TaskKind::Deliberation, prompt));
        }
        info!(
            session = %session.id,
            "Deliberation round {} opened for {} agent(s)",
            turn,
            dispatches.len()
        );
        dispatches
    }

    /// A round is over when no enabled agent is still working. Agents that
    /// finished without answering every pending issue abstain for the round.
    fn round_settled(&self, session: &Session, runtime: &SessionRuntime) -> bool {
        session
            .enabled_agents()
            .all(|agent| !runtime.is_in_flight(&agent.id))
    }

    /// Finish deliberation or open the next round, as far as the current
    /// state allows.
    pub(super) fn advance_deliberation(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
    ) -> Result<Vec<Dispatch>, OrchestrationError> {
        loop {
            if session.status() != SessionStatus::Deliberating {
                return Ok(Vec::new());
            }
            if session.all_issues_settled() {
                self.finish_deliberation(session)?;
                return Ok(Vec::new());
            }
            if !self.round_settled(session, runtime) {
                return Ok(Vec::new());
            }
            if session.turn >= session.config.max_turns {
                info!(
                    session = %session.id,
                    "Turn limit {} reached with {} undecided issue(s)",
                    session.config.max_turns,
                    session.open_issue_count()
                );
                self.finish_deliberation(session)?;
                return Ok(Vec::new());
            }

            session.turn += 1;
            for issue in session.issues.iter_mut().filter(|i| !i.consensus) {
                issue.turn += 1;
            }
            self.transition(session, SessionStatus::Deliberating)?;

            let dispatches = self.open_round(session, runtime);
            if !dispatches.is_empty() {
                return Ok(dispatches);
            }
        }
    }

    /// DELIBERATING → FIXING when any issue needs a fix, else → COMPLETE.
    fn finish_deliberation(&self, session: &mut Session) -> Result<(), OrchestrationError> {
        for issue in session.issues.iter_mut().filter(|i| !i.consensus) {
            issue.turn += 1;
        }
        let fixes = session.fix_required_issues().count();
        info!(
            session = %session.id,
            "Deliberation finished after turn {}: {} issue(s) need a fix",
            session.turn,
            fixes
        );
        let target = if fixes > 0 {
            SessionStatus::Fixing
        } else {
            SessionStatus::Complete
        };
        self.transition(session, target)
    }
}
