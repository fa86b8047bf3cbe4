//! Snapshot of a finished (or stopped) session for rendering.

use council_domain::{
    AgentStatus, ConsensusType, Issue, Session, SessionStatus, Severity, TaskKind,
};
use serde::Serialize;

/// One agent's last known state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub id: String,
    pub kind: String,
    pub status: AgentStatus,
    pub task: Option<TaskKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration of the last invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
}

/// Everything the formatters print
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouncilReport {
    pub session_id: String,
    pub status: SessionStatus,
    pub turn: u32,
    pub verification_round: u32,
    pub agents: Vec<AgentSummary>,
    pub issues: Vec<Issue>,
}

impl CouncilReport {
    pub fn from_session(session: &Session) -> Self {
        let agents = session
            .enabled_agents()
            .map(|agent| {
                let state = session.agent_states.get(&agent.id).cloned().unwrap_or_default();
                let elapsed_secs = match (state.started_at, state.completed_at) {
                    (Some(start), Some(end)) if end >= start => {
                        Some((end - start).num_milliseconds() as f64 / 1000.0)
                    }
                    _ => None,
                };
                AgentSummary {
                    id: agent.id.clone(),
                    kind: agent.kind.as_str().to_string(),
                    status: state.status,
                    task: state.task,
                    reason: state.last_reason,
                    error: state.last_error,
                    elapsed_secs,
                }
            })
            .collect();

        let mut issues = session.issues.clone();
        // Most severe first; ids keep the order stable within a severity
        issues.sort_by(|a, b| {
            effective_severity(b)
                .cmp(&effective_severity(a))
                .then_with(|| a.id.cmp(&b.id))
        });

        Self {
            session_id: session.id.clone(),
            status: session.status(),
            turn: session.turn,
            verification_round: session.verification_round,
            agents,
            issues,
        }
    }

    pub fn issues_with(&self, consensus: ConsensusType) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(move |issue| issue.consensus_type == consensus)
    }

    pub fn count(&self, consensus: ConsensusType) -> usize {
        self.issues_with(consensus).count()
    }

    pub fn failed_agents(&self) -> impl Iterator<Item = &AgentSummary> {
        self.agents
            .iter()
            .filter(|agent| agent.status == AgentStatus::Failed)
    }
}

/// Final severity once decided, otherwise the raised one
pub fn effective_severity(issue: &Issue) -> Severity {
    issue.final_severity.unwrap_or(issue.severity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{AgentKind, ModelConfig, SessionConfig};

    fn session() -> Session {
        let roster = vec![
            ModelConfig::new("claude1", AgentKind::Claude),
            ModelConfig::new("codex1", AgentKind::Codex),
            ModelConfig::new("gemini1", AgentKind::Gemini).disabled(),
        ];
        let mut session = Session::new("s-1", SessionConfig::new(roster));

        let mut low = Issue::raised("issue-1", "claude1", "Typo in log", Severity::Low, "a.rs");
        low.consensus = true;
        low.consensus_type = ConsensusType::Dismissed;
        low.final_severity = Some(Severity::Dismissed);
        let mut high = Issue::raised("issue-2", "codex1", "SQL injection", Severity::High, "b.rs");
        high.consensus = true;
        high.consensus_type = ConsensusType::FixRequired;
        high.final_severity = Some(Severity::Critical);
        session.issues = vec![low, high];

        session
            .agent_state_mut("codex1")
            .fail("program missing", Some("codex not found"));
        session
    }

    #[test]
    fn test_report_orders_issues_by_final_severity() {
        let report = CouncilReport::from_session(&session());
        let ids: Vec<_> = report.issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["issue-2", "issue-1"]);
        assert_eq!(report.count(ConsensusType::FixRequired), 1);
        assert_eq!(report.count(ConsensusType::Undecided), 0);
    }

    #[test]
    fn test_report_skips_disabled_agents() {
        let report = CouncilReport::from_session(&session());
        let ids: Vec<_> = report.agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["claude1", "codex1"]);

        let failed: Vec<_> = report.failed_agents().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].reason.as_deref(), Some("program missing"));
        assert_eq!(report.agents[0].status, AgentStatus::Waiting);
    }

    #[test]
    fn test_report_serializes_status_names() {
        let report = CouncilReport::from_session(&session());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["agents"][1]["status"], "FAILED");
        assert!(json["agents"][0].get("reason").is_none());
    }
}
