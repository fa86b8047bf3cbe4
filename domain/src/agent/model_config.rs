//! Static agent configuration.
//!
//! [`ModelConfig`] describes one configured reviewer: which external CLI
//! services it ([`AgentKind`]), which provider/model it asks for, and how it
//! should behave. Roster entries do not change once a
//! session is created.

use serde::{Deserialize, Serialize};

/// Which external CLI program services an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Anthropic Claude Code CLI (`claude`)
    Claude,
    /// OpenAI Codex CLI (`codex`)
    Codex,
    /// Google Gemini CLI (`gemini`)
    Gemini,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Claude, AgentKind::Codex, AgentKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Gemini => "gemini",
        }
    }

    /// Program name looked up on `PATH` when no override is configured
    pub fn default_program(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "claude-code" | "claude_code" => Ok(AgentKind::Claude),
            "codex" | "codex-cli" => Ok(AgentKind::Codex),
            "gemini" | "gemini-cli" => Ok(AgentKind::Gemini),
            other => Err(format!("unknown agent kind: {other}")),
        }
    }
}

/// How picky an agent should be when reviewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Lenient,
    #[default]
    Balanced,
    Strict,
}

impl Strictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strictness::Lenient => "lenient",
            Strictness::Balanced => "balanced",
            Strictness::Strict => "strict",
        }
    }
}

/// One configured reviewer agent.
///
/// # Example
///
/// ```
/// use council_domain::{AgentKind, ModelConfig};
///
/// let agent = ModelConfig::new("codex1", AgentKind::Codex)
///     .with_model("openai", "gpt-5.2-codex")
///     .with_role("Security reviewer");
///
/// assert!(agent.enabled);
/// assert_eq!(agent.model, "gpt-5.2-codex");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Agent identifier, unique within a session roster
    pub id: String,
    pub kind: AgentKind,
    /// Provider identifier (e.g. "anthropic", "openai")
    pub provider: String,
    /// Model identifier passed to the CLI; empty means the CLI's default
    pub model: String,
    /// Behavioral role text injected into prompts
    pub role: String,
    pub strictness: Strictness,
    pub enabled: bool,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            provider: String::new(),
            model: String::new(),
            role: String::new(),
            strictness: Strictness::default(),
            enabled: true,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
