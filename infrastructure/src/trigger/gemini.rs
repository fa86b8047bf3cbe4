//! Google Gemini CLI: `gemini -p <prompt>`, plain-text output.
//!
//! The plain-text mode reports no tool activity and no session id, so every
//! invocation starts a fresh conversation.

use super::cli::{CliProtocol, OutputParser, ParsedOutput};
use super::process::StderrPatterns;
use council_domain::{AgentKind, ModelConfig};

const FATAL: &[&str] = &[
    "quota exceeded",
    "tool execution denied by policy",
    "cannot be used with",
    "please set an auth method",
];

const TRANSIENT: &[&str] = &["resource_exhausted", "model is overloaded", "status 429"];

/// CLI preamble lines that are not part of the answer
const NOISE_PREFIXES: &[&str] = &["Loaded cached credentials", "Data collection is disabled"];

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiProtocol;

impl CliProtocol for GeminiProtocol {
    fn kind(&self) -> AgentKind {
        AgentKind::Gemini
    }

    fn args(&self, agent: &ModelConfig, _resume: Option<&str>, prompt: &str) -> Vec<String> {
        let mut args = Vec::new();
        if !agent.model.is_empty() {
            args.push("--model".to_string());
            args.push(agent.model.clone());
        }
        args.push("-p".to_string());
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
        Box::new(PlainText::default())
    }
}

#[derive(Debug, Default)]
struct PlainText {
    lines: Vec<String>,
}

impl OutputParser for PlainText {
    fn push_line(&mut self, line: &str) -> Vec<(&'static str, String)> {
        if !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            self.lines.push(line.to_string());
        }
        Vec::new()
    }

    fn finish(self: Box<Self>, _stderr: &str) -> ParsedOutput {
        ParsedOutput {
            text: self.lines.join("\n").trim().to_string(),
            session_id: None,
            error: None,
        }
    }
}
