//! Submission extraction from free-form agent output.
//!
//! Agents are asked to end their answer with a JSON block. These functions
//! pull that block out of the surrounding prose. No I/O happens here.
//!
//! | Shape | Result |
//! |-------|--------|
//! | `{"review": {"issues": [...]}}` | [`Submission::Review`] |
//! | `{"issues": [...]}` | [`Submission::Review`] |
//! | `{"opinions": [...]}` | [`Submission::Opinions`] |
//! | `{"opinion": {...}}` | [`Submission::Opinions`] (single entry) |

use crate::issue::submission::{OpinionInput, ReviewSubmission};
use serde_json::Value;

/// A submission recovered from agent output
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Review(ReviewSubmission),
    Opinions(Vec<OpinionInput>),
}

/// Extract a submission from agent output, if one is present.
///
/// Fenced ```` ```json ```` blocks are tried last-to-first (agents usually
/// put the final answer at the end); if none parses, the widest `{...}` span
/// in the text is tried. Returns `None` when nothing matches a known shape.
///
/// # Examples
///
/// ```
/// use council_domain::quorum::parsing::{Submission, parse_submission};
///
/// let text = "Looks fine.\n```json\n{\"opinions\": [{\"issue_id\": \"issue-1\", \"action\": \"no_fix\"}]}\n```";
/// assert!(matches!(parse_submission(text), Some(Submission::Opinions(ops)) if ops.len() == 1));
/// assert_eq!(parse_submission("no json here"), None);
/// ```
pub fn parse_submission(text: &str) -> Option<Submission> {
    for block in fenced_json_blocks(text).into_iter().rev() {
        if let Some(submission) = submission_from_str(block) {
            return Some(submission);
        }
    }

    if let Some(start) = text.find('{')
        && let Some(end) = text.rfind('}')
        && end > start
    {
        return submission_from_str(&text[start..=end]);
    }

    None
}

fn fenced_json_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let Some(newline) = after_fence.find('\n') else {
            break;
        };
        let lang = after_fence[..newline].trim();
        let body = &after_fence[newline + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        if lang.is_empty() || lang.eq_ignore_ascii_case("json") {
            blocks.push(&body[..close]);
        }
        rest = &body[close + 3..];
    }
    blocks
}

fn submission_from_str(raw: &str) -> Option<Submission> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    submission_from_value(value)
}

fn submission_from_value(mut value: Value) -> Option<Submission> {
    if let Some(review) = value.get_mut("review").map(Value::take) {
        return serde_json::from_value(review).ok().map(Submission::Review);
    }
    if value.get("issues").is_some_and(Value::is_array) {
        return serde_json::from_value(value).ok().map(Submission::Review);
    }
    if let Some(opinions) = value.get_mut("opinions").map(Value::take) {
        return serde_json::from_value(opinions)
            .ok()
            .map(Submission::Opinions);
    }
    if let Some(opinion) = value.get_mut("opinion").map(Value::take) {
        return serde_json::from_value(opinion)
            .ok()
            .map(|single| Submission::Opinions(vec![single]));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_in_fence() {
        let text = r#"I looked at the diff.

```json
{"review": {"issues": [{"title": "Missing auth check", "severity": "high", "file": "api.rs", "line_start": 42}]}}
```
"#;
        match parse_submission(text) {
            Some(Submission::Review(review)) => {
                assert_eq!(review.issues.len(), 1);
                assert_eq!(review.issues[0].line_start, Some(42));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_issues_object() {
        let text = r#"Result: {"issues": [], "summary": "clean"}"#;
        assert_eq!(
            parse_submission(text),
            Some(Submission::Review(ReviewSubmission {
                issues: vec![],
                summary: Some("clean".into())
            }))
        );
    }

    #[test]
    fn test_last_fenced_block_wins() {
        let text = "```json\n{\"opinion\": {\"issue_id\": \"issue-1\", \"action\": \"comment\"}}\n```\n\
                    then\n```json\n{\"opinion\": {\"issue_id\": \"issue-2\", \"action\": \"no_fix\"}}\n```";
        match parse_submission(text) {
            Some(Submission::Opinions(ops)) => assert_eq!(ops[0].issue_id, "issue-2"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_fence_is_skipped() {
        let text = "```rust\nfn main() {}\n```\n```json\n{\"issues\": []}\n```";
        assert!(matches!(parse_submission(text), Some(Submission::Review(_))));
    }

    #[test]
    fn test_unknown_shape_is_none() {
        assert_eq!(parse_submission(r#"{"verdict": "ok"}"#), None);
        assert_eq!(parse_submission("{ not json"), None);
        assert_eq!(parse_submission(""), None);
    }

    #[test]
    fn test_malformed_entries_are_rejected() {
        // opinions without issue_id do not deserialize
        assert_eq!(parse_submission(r#"{"opinions": [{"action": "no_fix"}]}"#), None);
    }
}
