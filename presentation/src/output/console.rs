//! Console output formatter for council reports

use crate::output::formatter::OutputFormatter;
use crate::output::report::{CouncilReport, effective_severity};
use colored::Colorize;
use council_domain::{AgentStatus, ConsensusType, Issue, OpinionAction, Severity};

/// Formats council reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete report
    pub fn format(report: &CouncilReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Review Council Results"));
        output.push('\n');

        output.push_str(&format!(
            "{} {}   {} {}   {} {}\n",
            "Session:".cyan().bold(),
            report.session_id,
            "Phase:".cyan().bold(),
            report.status.as_str(),
            "Turns:".cyan().bold(),
            report.turn
        ));
        if report.verification_round > 0 {
            output.push_str(&format!(
                "{} {}\n",
                "Verification rounds:".cyan().bold(),
                report.verification_round
            ));
        }

        // Agents
        output.push_str(&Self::section_header("Agents"));
        for agent in &report.agents {
            let mark = match agent.status {
                AgentStatus::Submitted => "v".green(),
                AgentStatus::Failed => "x".red(),
                AgentStatus::Reviewing => "~".yellow(),
                AgentStatus::Waiting => "-".dimmed(),
            };
            let mut line = format!("  {} {} ({})", mark, agent.id.bold(), agent.kind);
            if let Some(secs) = agent.elapsed_secs {
                line.push_str(&format!(" {:.1}s", secs).dimmed().to_string());
            }
            if let Some(reason) = &agent.reason {
                line.push_str(&format!(": {}", reason));
            }
            output.push_str(&line);
            output.push('\n');
            if agent.status == AgentStatus::Failed
                && let Some(error) = &agent.error
            {
                output.push_str(&Self::indent(error.trim(), "      "));
                output.push('\n');
            }
        }

        if report.issues.is_empty() {
            output.push_str(&format!("\n{}\n", "No issues were raised.".green()));
            output.push_str(&Self::footer());
            return output;
        }

        let groups = [
            (ConsensusType::FixRequired, "Fix Required"),
            (ConsensusType::Undecided, "Undecided"),
            (ConsensusType::Dismissed, "Dismissed"),
            (ConsensusType::Closed, "Withdrawn"),
        ];
        for (consensus, title) in groups {
            let issues: Vec<&Issue> = report.issues_with(consensus).collect();
            if issues.is_empty() {
                continue;
            }
            output.push_str(&Self::section_header(&format!("{} ({})", title, issues.len())));
            for issue in issues {
                output.push_str(&Self::format_issue(issue));
            }
        }

        output.push_str(&format!(
            "\n{} {} fix required, {} undecided, {} dismissed, {} withdrawn\n",
            "Summary:".cyan().bold(),
            report.count(ConsensusType::FixRequired),
            report.count(ConsensusType::Undecided),
            report.count(ConsensusType::Dismissed),
            report.count(ConsensusType::Closed),
        ));
        output.push_str(&Self::footer());

        output
    }

    /// Format as JSON
    pub fn format_json(report: &CouncilReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_issue(issue: &Issue) -> String {
        let severity = effective_severity(issue);
        let mut output = format!(
            "\n{} {} {}\n    {} {}\n",
            Self::severity_label(severity),
            issue.id.dimmed(),
            issue.title.bold(),
            issue.location().cyan(),
            format!("(raised by {})", issue.raised_by).dimmed()
        );
        if !issue.description.is_empty() {
            output.push_str(&Self::indent(&issue.description, "    "));
            output.push('\n');
        }
        if let Some(suggestion) = &issue.suggestion {
            output.push_str(&format!("    {} {}\n", "Suggestion:".yellow(), suggestion));
        }

        let votes: Vec<String> = issue
            .thread
            .iter()
            .filter(|o| {
                !matches!(
                    o.action,
                    OpinionAction::Raise | OpinionAction::Comment | OpinionAction::StatusChange
                )
            })
            .map(|o| format!("{}={}", o.agent_id, o.action.as_str()))
            .collect();
        if !votes.is_empty() {
            output.push_str(&format!("    {} {}\n", "Votes:".dimmed(), votes.join(", ")));
        }
        output
    }

    fn severity_label(severity: Severity) -> String {
        let label = format!("[{}]", severity.as_str().to_uppercase());
        match severity {
            Severity::Critical => label.red().bold().to_string(),
            Severity::High => label.red().to_string(),
            Severity::Medium => label.yellow().to_string(),
            Severity::Low | Severity::Info => label.blue().to_string(),
            Severity::Dismissed => label.dimmed().to_string(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &CouncilReport) -> String {
        Self::format(report)
    }

    fn format_json(&self, report: &CouncilReport) -> String {
        Self::format_json(report)
    }
}
