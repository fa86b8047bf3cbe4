//! Fix verification: only the original reporter of each fix-required issue
//! is asked whether the fix holds.

use super::types::{Dispatch, OrchestrationError, SessionRuntime};
use super::ReviewOrchestrator;
use crate::ports::prompt_builder::PromptRequest;
use crate::ports::session_store::lock_session;
use council_domain::{Issue, Opinion, OpinionAction, Session, SessionStatus, TaskKind};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

impl ReviewOrchestrator {
    /// FIXING → VERIFYING: the fix is in, ask the reporters to confirm it.
    ///
    /// Past the configured number of verification rounds the session is
    /// completed instead, whatever is still unresolved.
    pub fn mark_fix_complete(&self, session_id: &str) -> Result<(), OrchestrationError> {
        let shared = self.session(session_id)?;
        let runtime = self.require_runtime(session_id)?;

        let dispatches = {
            let mut session = lock_session(&shared);
            self.transition(&mut session, SessionStatus::Verifying)?;
            session.verification_round += 1;
            session.verification_results.clear();

            if session.verification_round > session.config.max_verification_rounds {
                warn!(
                    session = session_id,
                    "Verification round limit {} exceeded; completing with {} unverified issue(s)",
                    session.config.max_verification_rounds,
                    session.fix_required_issues().count()
                );
                self.transition(&mut session, SessionStatus::Complete)?;
                Vec::new()
            } else {
                let dispatches = self.open_verification(&mut session, &runtime);
                self.evaluate_verification(&mut session, &runtime)?;
                dispatches
            }
        };

        self.launch(session_id, dispatches);
        Ok(())
    }

    fn open_verification(&self, session: &mut Session, runtime: &SessionRuntime) -> Vec<Dispatch> {
        let round = session.verification_round;
        let mut by_reporter: BTreeMap<String, Vec<Issue>> = BTreeMap::new();
        for issue in session.fix_required_issues() {
            by_reporter
                .entry(issue.raised_by.clone())
                .or_default()
                .push(issue.clone());
        }

        let mut dispatches = Vec::with_capacity(by_reporter.len());
        for (reporter, issues) in by_reporter {
            let Some(agent) = session.agent(&reporter).filter(|a| a.enabled).cloned() else {
                debug!(session = %session.id, agent = %reporter, "Reporter unavailable for verification");
                continue;
            };
            let request = PromptRequest::Verification {
                round,
                issues: &issues,
            };
            let prompt = self.prompts.build(&session.id, &agent, &request);
            dispatches.push(self.prepare(runtime, session, &agent, TaskKind::Verification, prompt));
        }
        info!(
            session = %session.id,
            "Verification round {} sent to {} reporter(s)",
            round,
            dispatches.len()
        );
        dispatches
    }

    /// Record verification answers. Only the reporter of a fix-required issue
    /// can resolve it: `no_fix` means resolved, `fix_required` still broken.
    pub(super) fn record_verification(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
        agent_id: &str,
        accepted: Vec<(String, Opinion)>,
    ) -> Result<(), OrchestrationError> {
        for (issue_id, opinion) in accepted {
            let session_id = session.id.clone();
            let action = opinion.action;
            let issue = session.issue_mut(&issue_id)?;
            let is_reporter = issue.needs_fix() && issue.raised_by == agent_id;
            issue.push_opinion(opinion);

            if !is_reporter {
                debug!(session = %session_id, agent = agent_id, issue = %issue_id, "Not the reporter; answer kept for the record only");
                continue;
            }
            match action {
                OpinionAction::NoFix => {
                    session.verification_results.insert(issue_id, true);
                }
                OpinionAction::FixRequired => {
                    session.verification_results.insert(issue_id, false);
                }
                other => {
                    debug!(session = %session_id, issue = %issue_id, "Ignoring {} during verification", other.as_str());
                }
            }
        }

        session.agent_state_mut(agent_id).submitted();
        self.publish_agent_status(session, agent_id);
        self.evaluate_verification(session, runtime)
    }

    /// VERIFYING → FIXING as soon as any fix is reported broken, → COMPLETE
    /// once every fix is confirmed. Fixes whose reporter finished without
    /// answering count as unconfirmed.
    pub(super) fn evaluate_verification(
        &self,
        session: &mut Session,
        runtime: &SessionRuntime,
    ) -> Result<(), OrchestrationError> {
        if session.status() != SessionStatus::Verifying {
            return Ok(());
        }

        if session.verification_results.values().any(|resolved| !resolved) {
            info!(session = %session.id, "Fix reported as still broken");
            return self.transition(session, SessionStatus::Fixing);
        }

        let unanswered: Vec<(String, String)> = session
            .fix_required_issues()
            .filter(|i| !session.verification_results.contains_key(&i.id))
            .map(|i| (i.id.clone(), i.raised_by.clone()))
            .collect();

        if unanswered.is_empty() {
            info!(session = %session.id, "All fixes verified");
            return self.transition(session, SessionStatus::Complete);
        }

        if unanswered
            .iter()
            .all(|(_, reporter)| !runtime.is_in_flight(reporter))
        {
            warn!(
                session = %session.id,
                "{} fix(es) left unconfirmed by their reporters",
                unanswered.len()
            );
            return self.transition(session, SessionStatus::Fixing);
        }

        Ok(())
    }
}
