//! Issue and Opinion entities.
//!
//! An [`Issue`] carries an append-only thread of [`Opinion`]s. The thread is
//! the full audit trail and the only record of who has participated: pending
//! work, consensus and dedup bookkeeping are all derived by scanning it.

use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Resolved as not worth fixing (only ever a *final* severity)
    Dismissed,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Dismissed => "dismissed",
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Numeric rank used when merging duplicates (higher is more severe).
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dismissed" => Ok(Severity::Dismissed),
            "info" | "informational" => Ok(Severity::Info),
            "low" | "minor" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" | "major" => Ok(Severity::High),
            "critical" | "blocker" => Ok(Severity::Critical),
            other => Err(DomainError::InvalidSeverity(other.to_string())),
        }
    }
}

/// What an agent is saying about an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpinionAction {
    /// The agent originally reported the issue
    Raise,
    /// The issue is real and must be fixed
    FixRequired,
    /// The issue does not need a fix
    NoFix,
    /// Free-form remark, not a vote
    Comment,
    /// The issue is not an issue at all; triggers a dispute with the raiser
    FalsePositive,
    /// The raiser retracts the issue
    Withdraw,
    /// Bookkeeping entry written by the engine, never a vote
    StatusChange,
}

impl OpinionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpinionAction::Raise => "raise",
            OpinionAction::FixRequired => "fix_required",
            OpinionAction::NoFix => "no_fix",
            OpinionAction::Comment => "comment",
            OpinionAction::FalsePositive => "false_positive",
            OpinionAction::Withdraw => "withdraw",
            OpinionAction::StatusChange => "status_change",
        }
    }

    /// Votes that count toward the "agree" tally
    pub fn is_agree(&self) -> bool {
        matches!(self, OpinionAction::Raise | OpinionAction::FixRequired)
    }

    /// Votes that count toward the "disagree" tally
    pub fn is_disagree(&self) -> bool {
        matches!(self, OpinionAction::NoFix)
    }

    /// Whether this action is a vote at all
    pub fn is_vote(&self) -> bool {
        self.is_agree() || self.is_disagree()
    }
}

impl std::fmt::Display for OpinionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One agent's statement about an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub agent_id: String,
    pub action: OpinionAction,
    pub reasoning: String,
    pub suggested_severity: Option<Severity>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Deliberation turn the opinion was given in
    pub turn: u32,
    pub created_at: DateTime<Utc>,
}

impl Opinion {
    pub fn new(
        agent_id: impl Into<String>,
        action: OpinionAction,
        reasoning: impl Into<String>,
        turn: u32,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            action,
            reasoning: reasoning.into(),
            suggested_severity: None,
            confidence: 1.0,
            turn,
            created_at: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.suggested_severity = Some(severity);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }
}

/// Consensus resolution of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusType {
    FixRequired,
    Dismissed,
    /// Withdrawn by its raiser
    Closed,
    #[default]
    Undecided,
}

impl ConsensusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusType::FixRequired => "fix_required",
            ConsensusType::Dismissed => "dismissed",
            ConsensusType::Closed => "closed",
            ConsensusType::Undecided => "undecided",
        }
    }
}

impl std::fmt::Display for ConsensusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single reported finding and its deliberation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub file: String,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub description: String,
    pub suggestion: Option<String>,
    /// Agent that reported the issue
    pub raised_by: String,
    /// Append-only opinion thread, in insertion order
    pub thread: Vec<Opinion>,
    pub consensus: bool,
    pub consensus_type: ConsensusType,
    pub final_severity: Option<Severity>,
    /// Current deliberation turn for this issue
    pub turn: u32,
}

impl Issue {
    /// Create an issue whose thread starts with the raiser's `raise` opinion.
    pub fn raised(
        id: impl Into<String>,
        raised_by: impl Into<String>,
        title: impl Into<String>,
        severity: Severity,
        file: impl Into<String>,
    ) -> Self {
        let raised_by = raised_by.into();
        let title = title.into();
        let raise = Opinion::new(raised_by.clone(), OpinionAction::Raise, title.clone(), 1)
            .with_severity(severity);
        Self {
            id: id.into(),
            title,
            severity,
            file: file.into(),
            line_start: None,
            line_end: None,
            description: String::new(),
            suggestion: None,
            raised_by,
            thread: vec![raise],
            consensus: false,
            consensus_type: ConsensusType::Undecided,
            final_severity: None,
            turn: 1,
        }
    }

    pub fn with_lines(mut self, start: u32, end: Option<u32>) -> Self {
        self.line_start = Some(start);
        self.line_end = end.or(Some(start));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Append an opinion to the thread.
    pub fn push_opinion(&mut self, opinion: Opinion) {
        self.thread.push(opinion);
    }

    /// Whether `agent_id` appears anywhere in the thread.
    pub fn has_participant(&self, agent_id: &str) -> bool {
        self.thread.iter().any(|o| o.agent_id == agent_id)
    }

    /// Whether `agent_id` has said anything in this issue's current turn.
    pub fn has_responded_this_turn(&self, agent_id: &str) -> bool {
        self.thread
            .iter()
            .any(|o| o.agent_id == agent_id && o.turn >= self.turn)
    }

    /// Whether `agent_id` still owes an opinion on this issue.
    pub fn is_pending_for(&self, agent_id: &str) -> bool {
        !self.consensus && !self.has_responded_this_turn(agent_id)
    }

    /// Close the issue after its raiser withdrew it.
    pub fn close_withdrawn(&mut self) {
        self.consensus = true;
        self.consensus_type = ConsensusType::Closed;
        self.final_severity = Some(Severity::Dismissed);
    }

    pub fn is_closed(&self) -> bool {
        self.consensus_type == ConsensusType::Closed
    }

    pub fn needs_fix(&self) -> bool {
        self.consensus && self.consensus_type == ConsensusType::FixRequired
    }

    /// Short location label, e.g. `src/auth.rs:42-44`
    pub fn location(&self) -> String {
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) if end != start => format!("{}:{}-{}", self.file, start, end),
            (Some(start), _) => format!("{}:{}", self.file, start),
            _ => self.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_rank() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Info > Severity::Dismissed);
        assert_eq!(Severity::Critical.rank(), 5);
        assert_eq!(Severity::Dismissed.rank(), 0);
    }

    #[test]
    fn test_severity_parse_aliases() {
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert_eq!(" major ".parse::<Severity>(), Ok(Severity::High));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_raised_issue_thread_starts_with_raise() {
        let issue = Issue::raised("i-1", "codex1", "Missing auth check", Severity::High, "api.rs");
        assert_eq!(issue.thread.len(), 1);
        assert_eq!(issue.thread[0].action, OpinionAction::Raise);
        assert_eq!(issue.thread[0].agent_id, "codex1");
        assert_eq!(issue.thread[0].suggested_severity, Some(Severity::High));
        assert!(!issue.is_pending_for("codex1"));
        assert!(issue.is_pending_for("claude1"));
    }

    #[test]
    fn test_pending_follows_turn() {
        let mut issue = Issue::raised("i-1", "a", "t", Severity::Low, "f.rs");
        issue.push_opinion(Opinion::new("b", OpinionAction::Comment, "hm", 1));
        assert!(!issue.is_pending_for("b"));
        issue.turn = 2;
        assert!(issue.is_pending_for("b"));
        assert!(issue.is_pending_for("a"));
    }

    #[test]
    fn test_close_withdrawn() {
        let mut issue = Issue::raised("i-1", "a", "t", Severity::Low, "f.rs");
        issue.close_withdrawn();
        assert!(issue.consensus);
        assert!(issue.is_closed());
        assert_eq!(issue.final_severity, Some(Severity::Dismissed));
        assert!(!issue.is_pending_for("b"));
    }

    #[test]
    fn test_confidence_clamped() {
        let opinion = Opinion::new("a", OpinionAction::NoFix, "", 1).with_confidence(3.0);
        assert_eq!(opinion.confidence, 1.0);
        let opinion = Opinion::new("a", OpinionAction::NoFix, "", 1).with_confidence(f64::NAN);
        assert_eq!(opinion.confidence, 0.0);
    }

    #[test]
    fn test_location() {
        let issue = Issue::raised("i", "a", "t", Severity::Low, "x.rs").with_lines(3, Some(7));
        assert_eq!(issue.location(), "x.rs:3-7");
        let issue = Issue::raised("i", "a", "t", Severity::Low, "x.rs").with_lines(3, None);
        assert_eq!(issue.location(), "x.rs:3");
        assert_eq!(Issue::raised("i", "a", "t", Severity::Low, "x.rs").location(), "x.rs");
    }
}
