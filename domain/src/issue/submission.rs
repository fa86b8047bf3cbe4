//! Ingestion DTOs for agent submissions.
//!
//! Agents report in loosely-typed JSON. Everything is normalized here, at the
//! boundary, so the rest of the domain only ever sees canonical
//! [`OpinionAction`]s and [`Severity`]s.

use super::entities::{Issue, Opinion, OpinionAction, Severity};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Map an action string (including legacy spellings) to its canonical action.
///
/// Returns `None` for anything unrecognized.
pub fn normalize_action(raw: &str) -> Option<OpinionAction> {
    let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
    let action = match key.as_str() {
        "raise" => OpinionAction::Raise,
        "fix_required" | "agree" | "approve" | "fix" => OpinionAction::FixRequired,
        "no_fix" | "nofix" | "disagree" | "reject" => OpinionAction::NoFix,
        "comment" => OpinionAction::Comment,
        "false_positive" | "falsepositive" => OpinionAction::FalsePositive,
        "withdraw" | "retract" => OpinionAction::Withdraw,
        "status_change" => OpinionAction::StatusChange,
        _ => return None,
    };
    Some(action)
}

/// A raw finding as an agent reports it in its review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    pub title: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    pub file: String,
    #[serde(default, alias = "line")]
    pub line_start: Option<u32>,
    #[serde(default)]
    pub line_end: Option<u32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

fn default_severity() -> String {
    "medium".to_string()
}

impl RawFinding {
    pub fn new(title: impl Into<String>, severity: Severity, file: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            severity: severity.as_str().to_string(),
            file: file.into(),
            line_start: None,
            line_end: None,
            description: String::new(),
            suggestion: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line_start = Some(line);
        self
    }

    /// Validate and turn the finding into an [`Issue`] raised by `agent_id`.
    pub fn into_issue(self, id: String, agent_id: &str) -> Result<Issue, DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::InvalidFinding("empty title".into()));
        }
        let severity: Severity = self.severity.parse()?;
        if severity == Severity::Dismissed {
            return Err(DomainError::InvalidSeverity(
                "a finding cannot be raised as dismissed".into(),
            ));
        }
        let mut issue = Issue::raised(id, agent_id, self.title, severity, self.file)
            .with_description(self.description);
        if let Some(start) = self.line_start {
            issue = issue.with_lines(start, self.line_end);
        }
        if let Some(suggestion) = self.suggestion {
            issue = issue.with_suggestion(suggestion);
        }
        Ok(issue)
    }
}

/// An agent's complete independent review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    #[serde(default)]
    pub issues: Vec<RawFinding>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// One opinion as submitted, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionInput {
    pub issue_id: String,
    pub action: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub suggested_severity: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl OpinionInput {
    pub fn new(issue_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            action: action.into(),
            reasoning: String::new(),
            suggested_severity: None,
            confidence: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.suggested_severity = Some(severity.into());
        self
    }

    /// Normalize into a canonical [`Opinion`] for `agent_id` at `turn`.
    pub fn into_opinion(self, agent_id: &str, turn: u32) -> Result<Opinion, DomainError> {
        let action =
            normalize_action(&self.action).ok_or(DomainError::UnknownAction(self.action))?;
        let mut opinion = Opinion::new(agent_id, action, self.reasoning, turn)
            .with_confidence(self.confidence.unwrap_or(1.0));
        if let Some(raw) = self.suggested_severity {
            opinion = opinion.with_severity(raw.parse()?);
        }
        Ok(opinion)
    }
}
