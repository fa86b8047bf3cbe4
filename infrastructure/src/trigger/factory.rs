//! Trigger factory: the one place that branches on [`AgentKind`].

use super::claude::ClaudeProtocol;
use super::cli::CliTrigger;
use super::codex::CodexProtocol;
use super::gemini::GeminiProtocol;
use super::process::TriggerSettings;
use council_application::ports::agent_trigger::{AgentTrigger, TriggerFactory};
use council_domain::{AgentKind, ModelConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Builds CLI triggers, one fresh instance per call.
#[derive(Debug, Clone, Default)]
pub struct CliTriggerFactory {
    settings: TriggerSettings,
    /// Agent id → program overriding the kind's default
    commands: HashMap<String, String>,
}

impl CliTriggerFactory {
    pub fn new(settings: TriggerSettings) -> Self {
        Self {
            settings,
            commands: HashMap::new(),
        }
    }

    pub fn with_command(mut self, agent_id: impl Into<String>, program: impl Into<String>) -> Self {
        self.commands.insert(agent_id.into(), program.into());
        self
    }

    /// Program that will be launched for `agent`
    pub fn program_for(&self, agent: &ModelConfig) -> String {
        self.commands
            .get(&agent.id)
            .cloned()
            .unwrap_or_else(|| agent.kind.default_program().to_string())
    }

    /// Where `agent`'s program resolves on `PATH`, if it does.
    pub fn locate(&self, agent: &ModelConfig) -> Option<PathBuf> {
        which::which(self.program_for(agent)).ok()
    }
}

impl TriggerFactory for CliTriggerFactory {
    fn create(&self, agent: &ModelConfig) -> Arc<dyn AgentTrigger> {
        let program = self.program_for(agent);
        let settings = self.settings.clone();
        debug!(agent = %agent.id, kind = %agent.kind, "Creating trigger for {}", program);
        match agent.kind {
            AgentKind::Claude => Arc::new(CliTrigger::new(program, ClaudeProtocol, settings)),
            AgentKind::Codex => Arc::new(CliTrigger::new(program, CodexProtocol, settings)),
            AgentKind::Gemini => Arc::new(CliTrigger::new(program, GeminiProtocol, settings)),
        }
    }
}
