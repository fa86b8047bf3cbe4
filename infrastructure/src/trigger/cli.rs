//! Generic CLI trigger.
//!
//! [`CliTrigger`] implements [`AgentTrigger`] once. What differs between the
//! claude, codex and gemini CLIs (arguments, output format, stderr
//! signatures) lives behind [`CliProtocol`].

use super::process::{LaunchError, ProcessRunner, ProcessSpec, StderrPatterns, TriggerSettings};
use async_trait::async_trait;
use council_application::ports::agent_trigger::{ActivitySink, AgentTrigger, TriggerError};
use council_domain::{AgentKind, FailureKind, ModelConfig, TriggerResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// What one CLI kind contributes to a trigger.
pub trait CliProtocol: Send + Sync + 'static {
    fn kind(&self) -> AgentKind;

    /// Full argument list; `resume` is the external session id of an earlier run.
    fn args(&self, agent: &ModelConfig, resume: Option<&str>, prompt: &str) -> Vec<String>;

    fn stderr_patterns(&self) -> StderrPatterns;

    /// Fresh per-invocation parser for the program's stdout.
    fn parser(&self) -> Box<dyn OutputParser>;
}

/// Incremental stdout parser for one invocation.
pub trait OutputParser: Send {
    /// Consume one stdout line, returning the tool activity it reports.
    ///
    /// Lines that do not parse are skipped.
    fn push_line(&mut self, line: &str) -> Vec<(&'static str, String)>;

    /// Called once the process has ended.
    fn finish(self: Box<Self>, stderr: &str) -> ParsedOutput;
}

/// What a parser recovered from a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub text: String,
    /// External session id, for resumption
    pub session_id: Option<String>,
    /// Error reported in-band by the program itself
    pub error: Option<String>,
}

/// Trigger for one agent CLI, owned by one session.
pub struct CliTrigger<P> {
    program: String,
    protocol: P,
    runner: ProcessRunner,
    /// Local token → external session id (first success wins)
    resume_ids: Mutex<HashMap<String, String>>,
    next_token: AtomicU64,
    closed: AtomicBool,
}

impl<P: CliProtocol> CliTrigger<P> {
    pub fn new(program: impl Into<String>, protocol: P, settings: TriggerSettings) -> Self {
        Self {
            program: program.into(),
            protocol,
            runner: ProcessRunner::new(settings),
            resume_ids: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// External session id learned for `token`, if any
    pub fn resume_id(&self, token: &str) -> Option<String> {
        self.resume_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
    }

    fn remember_resume_id(&self, token: &str, external: &str) {
        let mut ids = self.resume_ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.contains_key(token) {
            debug!(kind = %self.protocol.kind(), "Resumable session {}", external);
            ids.insert(token.to_string(), external.to_string());
        }
    }
}

#[async_trait]
impl<P: CliProtocol> AgentTrigger for CliTrigger<P> {
    fn kind(&self) -> AgentKind {
        self.protocol.kind()
    }

    async fn create_session(&self, agent_id: &str) -> Result<String, TriggerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TriggerError::Closed);
        }
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-{}-{}", self.protocol.kind(), agent_id, n))
    }

    async fn send_prompt(
        &self,
        token: &str,
        agent: &ModelConfig,
        prompt: &str,
        activity: Option<&ActivitySink>,
    ) -> Result<TriggerResult, TriggerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TriggerError::Closed);
        }

        let resume = self.resume_id(token);
        let spec = ProcessSpec::new(
            self.program.clone(),
            self.protocol.args(agent, resume.as_deref(), prompt),
        );
        let command = spec.describe();

        let mut parser = self.protocol.parser();
        let launched = self
            .runner
            .run(&spec, self.protocol.stderr_patterns(), |line| {
                for (action, target) in parser.push_line(line) {
                    if let Some(sink) = activity {
                        sink.notify(&agent.id, action, &target);
                    }
                }
            })
            .await;

        let outcome = match launched {
            Ok(outcome) => outcome,
            Err(LaunchError::Missing(program)) => {
                return Ok(TriggerResult::failure(
                    FailureKind::ProgramMissing,
                    format!("`{program}` not found; is the {} CLI installed?", self.protocol.kind()),
                )
                .with_command(command));
            }
            Err(LaunchError::Denied(msg)) => {
                return Ok(TriggerResult::failure(FailureKind::LaunchFailed, msg).with_command(command));
            }
            Err(LaunchError::Io(e)) => return Err(TriggerError::Io(e.to_string())),
        };

        let parsed = parser.finish(&outcome.stderr);
        info!(
            agent = %agent.id,
            "{} finished in {:.1}s ({:?})",
            self.program,
            outcome.elapsed.as_secs_f64(),
            outcome.exit
        );

        if let Some(external) = parsed.session_id.as_deref()
            && outcome.succeeded()
        {
            self.remember_resume_id(token, external);
        }

        let result = match parsed.error {
            Some(error) if outcome.succeeded() => {
                TriggerResult::failure(FailureKind::ProcessFailed, error).with_output(parsed.text)
            }
            _ => outcome.into_result(parsed.text),
        };
        Ok(result
            .with_session_id(parsed.session_id)
            .with_command(command))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.runner
            .registry()
            .terminate_all(self.runner.settings().close_step_timeout)
            .await;
    }
}
