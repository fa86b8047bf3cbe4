//! Review session entity

use super::status::SessionStatus;
use crate::agent::model_config::ModelConfig;
use crate::agent::state::AgentState;
use crate::core::error::DomainError;
use crate::issue::entities::Issue;
use crate::issue::submission::ReviewSubmission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-session deliberation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Agent roster; disabled entries are kept but never triggered
    pub roster: Vec<ModelConfig>,
    /// Deliberation rounds before undecided issues are left undecided
    pub max_turns: u32,
    /// Distinct first votes needed on either side to settle an issue
    pub consensus_threshold: usize,
    /// Fix/verify cycles before the session is forced to complete
    pub max_verification_rounds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            roster: Vec::new(),
            max_turns: 3,
            consensus_threshold: 2,
            max_verification_rounds: 2,
        }
    }
}

impl SessionConfig {
    pub fn new(roster: Vec<ModelConfig>) -> Self {
        Self {
            roster,
            ..Default::default()
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.consensus_threshold = threshold;
        self
    }

    pub fn with_max_verification_rounds(mut self, rounds: u32) -> Self {
        self.max_verification_rounds = rounds;
        self
    }
}

/// How an agent's initial review attempt resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Submitted,
    Failed,
}

/// One code-review deliberation instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    status: SessionStatus,
    pub config: SessionConfig,
    /// Change under review, captured while collecting
    pub diff: Option<String>,
    pub issues: Vec<Issue>,
    pub agent_states: BTreeMap<String, AgentState>,
    /// External CLI session tokens, for conversational resumption
    pub process_sessions: BTreeMap<String, String>,
    pub review_outcomes: BTreeMap<String, ReviewOutcome>,
    /// Verification answers for the current round: issue id -> resolved
    pub verification_results: BTreeMap<String, bool>,
    /// Deliberation round counter
    pub turn: u32,
    pub verification_round: u32,
    next_issue_seq: u32,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Idle,
            config,
            diff: None,
            issues: Vec::new(),
            agent_states: BTreeMap::new(),
            process_sessions: BTreeMap::new(),
            review_outcomes: BTreeMap::new(),
            verification_results: BTreeMap::new(),
            turn: 0,
            verification_round: 0,
            next_issue_seq: 1,
            created_at: Utc::now(),
        }
    }

    // ==================== State Machine ====================

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn can_transition(&self, target: SessionStatus) -> bool {
        self.status.can_transition_to(target)
    }

    /// Move to `target`, failing with [`DomainError::InvalidTransition`] if illegal.
    pub fn transition(&mut self, target: SessionStatus) -> Result<SessionStatus, DomainError> {
        let from = self.status;
        self.status = from.transition_to(target)?;
        Ok(from)
    }

    // ==================== Roster ====================

    pub fn enabled_agents(&self) -> impl Iterator<Item = &ModelConfig> {
        self.config.roster.iter().filter(|m| m.enabled)
    }

    pub fn enabled_agent_count(&self) -> usize {
        self.enabled_agents().count()
    }

    pub fn agent(&self, agent_id: &str) -> Option<&ModelConfig> {
        self.config.roster.iter().find(|m| m.id == agent_id)
    }

    pub fn agent_state_mut(&mut self, agent_id: &str) -> &mut AgentState {
        self.agent_states.entry(agent_id.to_string()).or_default()
    }

    /// Remember the external session token for `agent_id`; the first one wins.
    ///
    /// Returns `true` if the token was stored.
    pub fn remember_process_session(&mut self, agent_id: &str, token: &str) -> bool {
        if token.is_empty() || self.process_sessions.contains_key(agent_id) {
            return false;
        }
        self.process_sessions
            .insert(agent_id.to_string(), token.to_string());
        true
    }

    // ==================== Reviews ====================

    /// Turn an agent's review into raw issues and record the attempt as submitted.
    ///
    /// Returns the ids of the issues created.
    pub fn record_review(
        &mut self,
        agent_id: &str,
        review: ReviewSubmission,
    ) -> Result<Vec<String>, DomainError> {
        if self.agent(agent_id).is_none() {
            return Err(DomainError::AgentNotFound(agent_id.to_string()));
        }
        // Validate every finding before any of them lands in the session
        let mut seq = self.next_issue_seq;
        let mut issues = Vec::with_capacity(review.issues.len());
        for finding in review.issues {
            issues.push(finding.into_issue(format!("issue-{seq}"), agent_id)?);
            seq += 1;
        }
        self.next_issue_seq = seq;

        let created = issues.iter().map(|i| i.id.clone()).collect();
        self.issues.extend(issues);
        self.review_outcomes
            .insert(agent_id.to_string(), ReviewOutcome::Submitted);
        Ok(created)
    }

    /// Record a review attempt that resolved without a submission.
    ///
    /// A later successful submission still upgrades the outcome.
    pub fn record_review_failure(&mut self, agent_id: &str) {
        self.review_outcomes
            .entry(agent_id.to_string())
            .or_insert(ReviewOutcome::Failed);
    }

    pub fn has_submitted_review(&self, agent_id: &str) -> bool {
        self.review_outcomes.get(agent_id) == Some(&ReviewOutcome::Submitted)
    }

    /// Review attempts that have resolved, successfully or not.
    pub fn resolved_review_count(&self) -> usize {
        self.review_outcomes.len()
    }

    // ==================== Issues ====================

    pub fn issue(&self, issue_id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == issue_id)
    }

    pub fn issue_mut(&mut self, issue_id: &str) -> Result<&mut Issue, DomainError> {
        self.issues
            .iter_mut()
            .find(|i| i.id == issue_id)
            .ok_or_else(|| DomainError::IssueNotFound(issue_id.to_string()))
    }

    /// Issues `agent_id` still owes an opinion on in the current turn.
    pub fn pending_issues_for(&self, agent_id: &str) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| i.is_pending_for(agent_id))
            .collect()
    }

    pub fn all_issues_settled(&self) -> bool {
        self.issues.iter().all(|i| i.consensus)
    }

    pub fn open_issue_count(&self) -> usize {
        self.issues.iter().filter(|i| !i.consensus).count()
    }

    pub fn fix_required_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.needs_fix())
    }

    /// Whether every enabled agent has responded to every currently pending issue.
    pub fn round_complete(&self) -> bool {
        self.enabled_agents()
            .all(|agent| self.pending_issues_for(&agent.id).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model_config::AgentKind;
    use crate::issue::entities::Severity;
    use crate::issue::submission::RawFinding;

    fn session() -> Session {
        Session::new(
            "s-1",
            SessionConfig::new(vec![
                ModelConfig::new("a", AgentKind::Claude),
                ModelConfig::new("b", AgentKind::Codex),
                ModelConfig::new("c", AgentKind::Gemini).disabled(),
            ]),
        )
    }

    #[test]
    fn test_transition_records_from() {
        let mut s = session();
        assert_eq!(s.transition(SessionStatus::Collecting), Ok(SessionStatus::Idle));
        assert_eq!(s.status(), SessionStatus::Collecting);
        assert!(s.transition(SessionStatus::Complete).is_err());
        // Failed transition leaves status untouched
        assert_eq!(s.status(), SessionStatus::Collecting);
    }

    #[test]
    fn test_enabled_agents_skip_disabled() {
        let s = session();
        assert_eq!(s.enabled_agent_count(), 2);
        assert!(s.enabled_agents().all(|a| a.id != "c"));
    }

    #[test]
    fn test_record_review_assigns_sequential_ids() {
        let mut s = session();
        let ids = s
            .record_review(
                "a",
                ReviewSubmission {
                    issues: vec![
                        RawFinding::new("One", Severity::High, "x.rs"),
                        RawFinding::new("Two", Severity::Low, "y.rs"),
                    ],
                    summary: None,
                },
            )
            .unwrap();
        assert_eq!(ids, vec!["issue-1", "issue-2"]);
        assert!(s.has_submitted_review("a"));
        assert_eq!(s.resolved_review_count(), 1);
    }

    #[test]
    fn test_record_review_is_all_or_nothing() {
        let mut s = session();
        let mut bad = RawFinding::new("", Severity::High, "x.rs");
        bad.title = "  ".into();
        let err = s
            .record_review(
                "a",
                ReviewSubmission {
                    issues: vec![RawFinding::new("Fine", Severity::Low, "x.rs"), bad],
                    summary: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidFinding(_)));
        assert!(s.issues.is_empty());
        assert!(!s.has_submitted_review("a"));

        // The sequence was not consumed by the rejected review
        let ids = s
            .record_review(
                "a",
                ReviewSubmission {
                    issues: vec![RawFinding::new("Fine", Severity::Low, "x.rs")],
                    summary: None,
                },
            )
            .unwrap();
        assert_eq!(ids, vec!["issue-1"]);
    }

    #[test]
    fn test_record_review_unknown_agent() {
        let mut s = session();
        let err = s.record_review("zed", ReviewSubmission::default()).unwrap_err();
        assert_eq!(err, DomainError::AgentNotFound("zed".into()));
    }

    #[test]
    fn test_failure_then_late_submission_upgrades() {
        let mut s = session();
        s.record_review_failure("b");
        assert!(!s.has_submitted_review("b"));
        s.record_review("b", ReviewSubmission::default()).unwrap();
        assert!(s.has_submitted_review("b"));
        assert_eq!(s.resolved_review_count(), 1);
    }

    #[test]
    fn test_process_session_first_wins() {
        let mut s = session();
        assert!(s.remember_process_session("a", "tok-1"));
        assert!(!s.remember_process_session("a", "tok-2"));
        assert!(!s.remember_process_session("b", ""));
        assert_eq!(s.process_sessions.get("a").map(String::as_str), Some("tok-1"));
    }

    #[test]
    fn test_round_complete() {
        let mut s = session();
        s.issues
            .push(Issue::raised("issue-1", "a", "t", Severity::Low, "f.rs"));
        assert!(!s.round_complete());
        s.issues[0].push_opinion(crate::issue::entities::Opinion::new(
            "b",
            crate::issue::entities::OpinionAction::NoFix,
            "",
            1,
        ));
        assert!(s.round_complete());
    }
}
