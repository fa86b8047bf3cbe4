//! Default prompt builder.
//!
//! Plain string templates, one per phase. Every prompt ends with the JSON
//! block the agent must print, which the engine parses out of its output.

use council_application::ports::prompt_builder::{PromptBuilder, PromptRequest};
use council_domain::{Issue, ModelConfig, Strictness};

/// Diffs beyond this size are cut before prompting
const MAX_DIFF_BYTES: usize = 200 * 1024;

const REVIEW_CONTRACT: &str = r#"End your answer with exactly one JSON block in this shape:

```json
{"review": {"issues": [
  {"title": "...", "severity": "critical|high|medium|low|info", "file": "path/to/file",
   "line_start": 10, "line_end": 12, "description": "...", "suggestion": "..."}
], "summary": "..."}}
```
Use an empty `issues` list when you find nothing worth fixing."#;

const OPINION_CONTRACT: &str = r#"End your answer with exactly one JSON block in this shape:

```json
{"opinions": [
  {"issue_id": "issue-1", "action": "fix_required|no_fix|false_positive|withdraw|comment",
   "reasoning": "...", "suggested_severity": "high", "confidence": 0.8}
]}
```"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl DefaultPromptBuilder {
    fn persona(agent: &ModelConfig) -> String {
        let role = if agent.role.is_empty() {
            "a senior code reviewer"
        } else {
            agent.role.as_str()
        };
        let stance = match agent.strictness {
            Strictness::Lenient => "Only report problems that would clearly break something.",
            Strictness::Balanced => "Report real problems; skip matters of taste.",
            Strictness::Strict => "Report every defect you can justify, including minor ones.",
        };
        format!(
            "You are {role}, agent `{}` on a review council of several independent reviewers.\n{stance}",
            agent.id
        )
    }

    fn review(session_id: &str, agent: &ModelConfig, diff: Option<&str>) -> String {
        let diff = match diff {
            Some(d) if !d.trim().is_empty() => clip(d, MAX_DIFF_BYTES),
            _ => "(no diff was provided; review the working tree changes)".to_string(),
        };
        format!(
            r#"{persona}

Session: {session_id}

Review the following change independently. Other reviewers will see your
findings later and vote on each of them.

```diff
{diff}
```

{REVIEW_CONTRACT}"#,
            persona = Self::persona(agent),
        )
    }

    fn deliberation(session_id: &str, agent: &ModelConfig, turn: u32, issues: &[Issue]) -> String {
        format!(
            r#"{persona}

Session: {session_id} / deliberation turn {turn}

Other reviewers raised the issues below. For each one, decide whether it must
be fixed (`fix_required`), is not worth fixing (`no_fix`), or is not a real
problem at all (`false_positive`). Withdraw (`withdraw`) only issues you raised yourself.

{issues}

{OPINION_CONTRACT}"#,
            persona = Self::persona(agent),
            issues = render_issues(issues),
        )
    }

    fn verification(session_id: &str, agent: &ModelConfig, round: u32, issues: &[Issue]) -> String {
        format!(
            r#"{persona}

Session: {session_id} / verification round {round}

You reported the issues below and the council agreed they needed a fix. A fix
has now been applied. Check each one: answer `no_fix` if it is resolved, or
`fix_required` if it is still broken.

{issues}

{OPINION_CONTRACT}"#,
            persona = Self::persona(agent),
            issues = render_issues(issues),
        )
    }

    fn dispute(
        session_id: &str,
        agent: &ModelConfig,
        issue: &Issue,
        disputed_by: &str,
        reasoning: &str,
    ) -> String {
        let reasoning = if reasoning.trim().is_empty() {
            "(no reasoning given)"
        } else {
            reasoning
        };
        format!(
            r#"{persona}

Session: {session_id}

`{disputed_by}` believes one of your issues is a false positive:

{issue}

Their reasoning: {reasoning}

Re-evaluate it. Answer `withdraw` if they are right, or `fix_required` if the
issue stands.

{OPINION_CONTRACT}"#,
            persona = Self::persona(agent),
            issue = render_issue(issue),
        )
    }
}

impl PromptBuilder for DefaultPromptBuilder {
    fn build(&self, session_id: &str, agent: &ModelConfig, request: &PromptRequest<'_>) -> String {
        match *request {
            PromptRequest::Review { diff } => Self::review(session_id, agent, diff),
            PromptRequest::Deliberation { turn, issues } => {
                Self::deliberation(session_id, agent, turn, issues)
            }
            PromptRequest::Verification { round, issues } => {
                Self::verification(session_id, agent, round, issues)
            }
            PromptRequest::Dispute {
                issue,
                disputed_by,
                reasoning,
            } => Self::dispute(session_id, agent, issue, disputed_by, reasoning),
        }
    }
}

fn render_issue(issue: &Issue) -> String {
    let mut out = format!(
        "- {} [{}] {} ({}), raised by {}",
        issue.id,
        issue.severity.as_str(),
        issue.title,
        issue.location(),
        issue.raised_by
    );
    if !issue.description.is_empty() {
        out.push_str(&format!("\n  {}", issue.description));
    }
    if let Some(suggestion) = &issue.suggestion {
        out.push_str(&format!("\n  Suggested fix: {suggestion}"));
    }
    for opinion in issue.thread.iter().skip(1) {
        out.push_str(&format!(
            "\n  > {} said {}: {}",
            opinion.agent_id,
            opinion.action.as_str(),
            opinion.reasoning
        ));
    }
    out
}

fn render_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(render_issue)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (diff truncated, {} bytes omitted)", &text[..end], text.len() - end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{AgentKind, Opinion, OpinionAction, Severity};

    fn issue() -> Issue {
        let mut issue = Issue::raised("issue-3", "codex1", "Missing auth check", Severity::High, "api.rs")
            .with_lines(42, None);
        issue.push_opinion(Opinion::new("gemini1", OpinionAction::NoFix, "handled upstream", 1));
        issue
    }

    #[test]
    fn test_review_prompt_contains_diff_and_contract() {
        let agent = ModelConfig::new("claude1", AgentKind::Claude).with_role("Security reviewer");
        let prompt = DefaultPromptBuilder.build(
            "s-9",
            &agent,
            &PromptRequest::Review {
                diff: Some("+fn main() {}"),
            },
        );
        assert!(prompt.contains("You are Security reviewer, agent `claude1`"));
        assert!(prompt.contains("+fn main() {}"));
        assert!(prompt.contains("Session: s-9"));
        assert!(prompt.contains(r#"{"review": {"issues""#));
    }

    #[test]
    fn test_deliberation_lists_issue_and_thread() {
        let agent = ModelConfig::new("claude1", AgentKind::Claude);
        let issues = vec![issue()];
        let prompt = DefaultPromptBuilder.build(
            "s-9",
            &agent,
            &PromptRequest::Deliberation {
                turn: 2,
                issues: &issues,
            },
        );
        assert!(prompt.contains("deliberation turn 2"));
        assert!(prompt.contains("- issue-3 [high] Missing auth check (api.rs:42), raised by codex1"));
        assert!(prompt.contains("> gemini1 said no_fix: handled upstream"));
        assert!(prompt.contains(r#"{"opinions": ["#));
    }

    #[test]
    fn test_dispute_names_challenger() {
        let agent = ModelConfig::new("codex1", AgentKind::Codex);
        let issue = issue();
        let prompt = DefaultPromptBuilder.build(
            "s-9",
            &agent,
            &PromptRequest::Dispute {
                issue: &issue,
                disputed_by: "gemini1",
                reasoning: "",
            },
        );
        assert!(prompt.contains("`gemini1` believes"));
        assert!(prompt.contains("(no reasoning given)"));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let text = "é".repeat(10);
        let clipped = clip(&text, 5);
        assert!(clipped.starts_with("éé\n"));
        assert!(clipped.contains("16 bytes omitted"));
    }
}
