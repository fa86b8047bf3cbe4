//! Claude Code CLI: `claude -p --output-format stream-json --verbose`.
//!
//! Output is one JSON event per line:
//!
//! - `system`/`init` carries the `session_id`
//! - `assistant` messages carry `text` and `tool_use` content blocks
//! - a final `result` event carries the answer, `is_error` and `session_id`

use super::activity::classify_tool;
use super::cli::{CliProtocol, OutputParser, ParsedOutput};
use super::process::StderrPatterns;
use council_domain::{AgentKind, ModelConfig};
use serde_json::Value;
use tracing::trace;

const FATAL: &[&str] = &[
    "credit balance is too low",
    "usage limit reached",
    "requires --verbose",
    "permission denied by policy",
    "invalid api key",
];

// Bare "529" also matches pids and byte counts
const TRANSIENT: &[&str] = &["overloaded", "status 529", "error: 529", "rate limit"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeProtocol;

impl CliProtocol for ClaudeProtocol {
    fn kind(&self) -> AgentKind {
        AgentKind::Claude
    }

    fn args(&self, agent: &ModelConfig, resume: Option<&str>, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = ["-p", "--output-format", "stream-json", "--verbose"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if !agent.model.is_empty() {
            args.push("--model".into());
            args.push(agent.model.clone());
        }
        if let Some(session) = resume {
            args.push("--resume".into());
            args.push(session.to_string());
        }
        args.push(prompt.to_string());
        args
    }

    fn stderr_patterns(&self) -> StderrPatterns {
        StderrPatterns {
            fatal: FATAL,
            transient: TRANSIENT,
        }
    }

    fn parser(&self) -> Box<dyn OutputParser> {
        Box::new(ClaudeStream::default())
    }
}

#[derive(Debug, Default)]
struct ClaudeStream {
    assistant_text: Vec<String>,
    result: Option<String>,
    session_id: Option<String>,
    error: Option<String>,
}

impl ClaudeStream {
    fn note_session(&mut self, event: &Value) {
        if self.session_id.is_none()
            && let Some(id) = event.get("session_id").and_then(Value::as_str)
            && !id.is_empty()
        {
            self.session_id = Some(id.to_string());
        }
    }
}

impl OutputParser for ClaudeStream {
    fn push_line(&mut self, line: &str) -> Vec<(&'static str, String)> {
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            trace!("claude: skipping non-JSON line");
            return Vec::new();
        };
        self.note_session(&event);

        let mut activity = Vec::new();
        match event.get("type").and_then(Value::as_str) {
            Some("assistant") => {
                let blocks = event
                    .pointer("/message/content")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                for block in blocks {
                    match block.get("type").and_then(Value::as_str) {
                        Some("text") => {
                            if let Some(text) = block.get("text").and_then(Value::as_str) {
                                self.assistant_text.push(text.to_string());
                            }
                        }
                        Some("tool_use") => {
                            let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                            let input = block.get("input").cloned().unwrap_or(Value::Null);
                            activity.extend(classify_tool(name, &input));
                        }
                        _ => {}
                    }
                }
            }
            Some("result") => {
                let text = event
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if event.get("is_error").and_then(Value::as_bool) == Some(true) {
                    self.error = Some(if text.is_empty() {
                        event
                            .get("subtype")
                            .and_then(Value::as_str)
                            .unwrap_or("error")
                            .to_string()
                    } else {
                        text.clone()
                    });
                }
                self.result = Some(text);
            }
            _ => {}
        }
        activity
    }

    fn finish(self: Box<Self>, _stderr: &str) -> ParsedOutput {
        let text = match self.result {
            Some(result) if !result.is_empty() => result,
            _ => self.assistant_text.join("\n"),
        };
        ParsedOutput {
            text,
            session_id: self.session_id,
            error: self.error,
        }
    }
}
