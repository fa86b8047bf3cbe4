//! Deliberation settings from TOML (`[council]` section)

use council_domain::{ModelConfig, SessionConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCouncilConfig {
    /// Deliberation rounds before undecided issues are left as they are
    pub max_turns: u32,
    /// Distinct votes needed on either side of an issue
    pub consensus_threshold: usize,
    /// Fix/verify cycles before the session completes regardless
    pub max_verification_rounds: u32,
}

impl Default for FileCouncilConfig {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            max_turns: defaults.max_turns,
            consensus_threshold: defaults.consensus_threshold,
            max_verification_rounds: defaults.max_verification_rounds,
        }
    }
}

impl FileCouncilConfig {
    pub fn to_session_config(&self, roster: Vec<ModelConfig>) -> SessionConfig {
        SessionConfig::new(roster)
            .with_max_turns(self.max_turns)
            .with_threshold(self.consensus_threshold)
            .with_max_verification_rounds(self.max_verification_rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_session_defaults() {
        let session = FileCouncilConfig::default().to_session_config(vec![]);
        assert_eq!(session, SessionConfig::default());
    }
}
