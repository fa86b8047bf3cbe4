//! OpenAI Codex CLI: `codex exec --json`.
//!
//! Resuming uses `codex exec --json resume <session> <prompt>`. The session
//! id comes from the `thread.started` event; older builds only print it as
//! `session id: <uuid>` text, so non-JSON lines and stderr are scanned too.

use super::activity::{RUN, classify_tool};
use super::cli::{CliProtocol, OutputParser, ParsedOutput};
use super::process::StderrPatterns;
use council_domain::{AgentKind, ModelConfig};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::trace;

const FATAL: &[&str] = &[
    "you've hit your usage limit",
    "unexpected argument",
    "rejected by policy",
    "not logged in",
];

const TRANSIENT: &[&str] = &["stream disconnected", "reconnecting", "rate limit"];

static SESSION_ID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)session[ _]id:\s*([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})")
        .ok()
});

/// Find a `session id: <uuid>` mention in free text.
pub fn scrape_session_id(text: &str) -> Option<String> {
    SESSION_ID
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodexProtocol;

impl CliProtocol for CodexProtocol {
    fn kind(&self) -> AgentKind {
        AgentKind::Codex
    }

    fn args(&self, agent: &ModelConfig, resume: Option<&str>, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            "--json".to_string(),
            "--skip-git-repo-check".to_string(),
        ];
        if !agent.model.is_empty() {
            args.push("--model".into());
            args.push(agent.model.clone());
        }
        if let Some(session) = resume {
            args.push("resume".into());
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
        Box::new(CodexStream::default())
    }
}

#[derive(Debug, Default)]
struct CodexStream {
    messages: Vec<String>,
    session_id: Option<String>,
    error: Option<String>,
}

impl CodexStream {
    fn set_session(&mut self, id: Option<String>) {
        if self.session_id.is_none() {
            self.session_id = id.filter(|s| !s.is_empty());
        }
    }

    fn on_item(&mut self, item: &Value, completed: bool) -> Option<(&'static str, String)> {
        match item.get("type").and_then(Value::as_str)? {
            "agent_message" if completed => {
                let text = item.get("text").and_then(Value::as_str)?;
                self.messages.push(text.to_string());
                None
            }
            // Report commands when they start, not again when they finish
            "command_execution" if !completed => {
                classify_tool("command_execution", item).or(Some((RUN, String::new())))
            }
            "mcp_tool_call" if !completed => {
                let name = item.get("tool").and_then(Value::as_str)?;
                classify_tool(name, item.get("arguments").unwrap_or(&Value::Null))
            }
            _ => None,
        }
    }
}

impl OutputParser for CodexStream {
    fn push_line(&mut self, line: &str) -> Vec<(&'static str, String)> {
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            trace!("codex: non-JSON line");
            self.set_session(scrape_session_id(line));
            return Vec::new();
        };

        let activity = match event.get("type").and_then(Value::as_str) {
            Some("thread.started") => {
                self.set_session(
                    event
                        .get("thread_id")
                        .and_then(Value::as_str)
                        .map(String::from),
                );
                None
            }
            Some("item.started") => event.get("item").and_then(|item| self.on_item(item, false)),
            Some("item.completed") => event.get("item").and_then(|item| self.on_item(item, true)),
            Some("turn.failed") => {
                self.error = event
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .or_else(|| Some("turn failed".to_string()));
                None
            }
            Some("error") => {
                if let Some(message) = event.get("message").and_then(Value::as_str) {
                    self.error = Some(message.to_string());
                }
                None
            }
            _ => None,
        };
        activity.into_iter().collect()
    }

    fn finish(mut self: Box<Self>, stderr: &str) -> ParsedOutput {
        self.set_session(scrape_session_id(stderr));
        ParsedOutput {
            text: self.messages.join("\n"),
            session_id: self.session_id,
            error: self.error,
        }
    }
}
