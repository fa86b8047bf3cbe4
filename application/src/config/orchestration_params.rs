//! Orchestration parameters: engine-side retry and ingestion control.
//!
//! These are application-layer concerns. Deliberation limits (turns,
//! threshold, verification rounds) are domain policy and live on
//! [`SessionConfig`](council_domain::SessionConfig) instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationParams {
    /// Total attempts for one trigger invocation when it faults.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_base_delay: Duration,
    /// Parse JSON submissions out of successful agent output.
    pub ingest_output_submissions: bool,
}

impl Default for OrchestrationParams {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            ingest_output_submissions: true,
        }
    }
}

impl OrchestrationParams {
    // ==================== Builder Methods ====================

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_output_ingestion(mut self, enabled: bool) -> Self {
        self.ingest_output_submissions = enabled;
        self
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}
