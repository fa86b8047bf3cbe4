//! Subprocess and retry settings from TOML (`[trigger]` section)

use crate::trigger::TriggerSettings;
use council_application::OrchestrationParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTriggerConfig {
    /// Hard bound on one agent invocation
    pub timeout_secs: u64,
    /// Wait between SIGTERM and SIGKILL
    pub grace_secs: u64,
    /// How long a transient stderr condition may last
    pub transient_grace_secs: u64,
    /// Attempts per invocation when it faults unexpectedly
    pub retry_attempts: u32,
    /// First retry delay; doubled on each further retry
    pub retry_base_delay_ms: u64,
    /// Per-step bound while closing a session's processes
    pub close_step_timeout_secs: u64,
}

impl Default for FileTriggerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            grace_secs: 5,
            transient_grace_secs: 60,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            close_step_timeout_secs: 3,
        }
    }
}

impl FileTriggerConfig {
    pub fn to_settings(&self) -> TriggerSettings {
        TriggerSettings {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            grace: Duration::from_secs(self.grace_secs),
            transient_grace: Duration::from_secs(self.transient_grace_secs),
            close_step_timeout: Duration::from_secs(self.close_step_timeout_secs.max(1)),
        }
    }

    pub fn to_params(&self) -> OrchestrationParams {
        OrchestrationParams::default()
            .with_max_attempts(self.retry_attempts)
            .with_retry_base_delay(Duration::from_millis(self.retry_base_delay_ms))
    }
}
