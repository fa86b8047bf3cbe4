//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted to domain types on demand.

mod council;
mod logging;
mod roster;
mod trigger;

pub use council::FileCouncilConfig;
pub use logging::FileLoggingConfig;
pub use roster::FileAgentEntry;
pub use trigger::FileTriggerConfig;

use crate::trigger::CliTriggerFactory;
use council_domain::{ModelConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A configuration problem worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Dotted path of the offending field
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Reviewer roster
    pub agents: Vec<FileAgentEntry>,
    /// Deliberation limits
    pub council: FileCouncilConfig,
    /// Subprocess and retry settings
    pub trigger: FileTriggerConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Roster entries with a known kind, in file order
    pub fn roster(&self) -> Vec<ModelConfig> {
        self.agents
            .iter()
            .filter_map(FileAgentEntry::to_model_config)
            .collect()
    }

    pub fn session_config(&self) -> SessionConfig {
        self.council.to_session_config(self.roster())
    }

    /// Trigger factory with the `[trigger]` timings and per-agent command overrides
    pub fn trigger_factory(&self) -> CliTriggerFactory {
        self.agents
            .iter()
            .filter_map(|a| a.command.as_ref().map(|c| (a.id.clone(), c.clone())))
            .fold(
                CliTriggerFactory::new(self.trigger.to_settings()),
                |factory, (id, command)| factory.with_command(id, command),
            )
    }

    /// Check the configuration, returning every problem found.
    ///
    /// Nothing here is fatal: unknown agents are dropped from the roster and
    /// the remaining values are used as given.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for (i, agent) in self.agents.iter().enumerate() {
            let field = format!("agents[{i}]");
            if agent.id.trim().is_empty() {
                warnings.push(ConfigWarning::new(&field, "agent id is empty"));
            } else if !seen.insert(agent.id.as_str()) {
                warnings.push(ConfigWarning::new(
                    &field,
                    format!("duplicate agent id '{}'", agent.id),
                ));
            }
            if let Err(e) = agent.parse_kind() {
                warnings.push(ConfigWarning::new(
                    format!("{field}.kind"),
                    format!("{e}; agent '{}' is ignored", agent.id),
                ));
            }
            if let Err(e) = agent.parse_strictness() {
                warnings.push(ConfigWarning::new(
                    format!("{field}.strictness"),
                    format!("{e}; using 'balanced'"),
                ));
            }
        }

        let threshold = self.council.consensus_threshold;
        let enabled = self.roster().iter().filter(|a| a.enabled).count();
        if threshold == 0 {
            warnings.push(ConfigWarning::new(
                "council.consensus_threshold",
                "threshold 0 settles every issue immediately",
            ));
        } else if enabled > 0 && threshold > enabled {
            warnings.push(ConfigWarning::new(
                "council.consensus_threshold",
                format!(
                    "threshold {threshold} exceeds the {enabled} enabled agent(s); issues can only settle by turn limit"
                ),
            ));
        }
        if self.council.max_turns == 0 {
            warnings.push(ConfigWarning::new(
                "council.max_turns",
                "0 turns ends deliberation after the first round",
            ));
        }

        warnings
    }
}
