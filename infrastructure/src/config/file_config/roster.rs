//! Agent roster from TOML (`[[agents]]` array)

use council_domain::{AgentKind, ModelConfig, Strictness};
use serde::{Deserialize, Serialize};

/// One `[[agents]]` entry.
///
/// `kind` and `strictness` stay strings here so a typo becomes a validation
/// warning instead of a parse failure for the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAgentEntry {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub strictness: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Program to launch instead of the kind's default CLI
    #[serde(default)]
    pub command: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl FileAgentEntry {
    pub fn parse_kind(&self) -> Result<AgentKind, String> {
        self.kind.parse()
    }

    pub fn parse_strictness(&self) -> Result<Strictness, String> {
        match self.strictness.as_deref().map(|s| s.trim().to_lowercase()) {
            None => Ok(Strictness::default()),
            Some(s) => match s.as_str() {
                "lenient" => Ok(Strictness::Lenient),
                "balanced" => Ok(Strictness::Balanced),
                "strict" => Ok(Strictness::Strict),
                other => Err(format!("unknown strictness: {other}")),
            },
        }
    }

    /// Convert to a roster entry; `None` when the kind is unknown.
    ///
    /// An unknown strictness falls back to the default.
    pub fn to_model_config(&self) -> Option<ModelConfig> {
        let kind = self.parse_kind().ok()?;
        let mut config = ModelConfig::new(self.id.clone(), kind)
            .with_model(self.provider.clone(), self.model.clone())
            .with_role(self.role.clone())
            .with_strictness(self.parse_strictness().unwrap_or_default());
        config.enabled = self.enabled;
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults() {
        let entry: FileAgentEntry = toml::from_str(
            r#"
id = "claude1"
kind = "claude"
"#,
        )
        .unwrap();
        assert!(entry.enabled);
        assert_eq!(entry.command, None);

        let config = entry.to_model_config().unwrap();
        assert_eq!(config.kind, AgentKind::Claude);
        assert_eq!(config.strictness, Strictness::Balanced);
        assert!(config.model.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let entry: FileAgentEntry = toml::from_str(
            r#"
id = "x"
kind = "copilot"
strictness = "pedantic"
"#,
        )
        .unwrap();
        assert!(entry.parse_kind().is_err());
        assert!(entry.parse_strictness().is_err());
        assert_eq!(entry.to_model_config(), None);
    }
}
