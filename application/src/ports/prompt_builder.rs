//! Prompt builder port
//!
//! The engine treats prompt text as opaque: it says which phase it needs a
//! prompt for and hands the returned string to the agent's trigger.

use council_domain::{Issue, ModelConfig};

/// Phase-specific input for one prompt
#[derive(Debug, Clone, Copy)]
pub enum PromptRequest<'a> {
    /// Independent review of the change
    Review { diff: Option<&'a str> },
    /// One deliberation round over the issues the agent still owes an opinion on
    Deliberation { turn: u32, issues: &'a [Issue] },
    /// Confirm whether the agent's own fix-required issues are resolved
    Verification { round: u32, issues: &'a [Issue] },
    /// Re-evaluate an issue another agent called a false positive
    Dispute {
        issue: &'a Issue,
        disputed_by: &'a str,
        reasoning: &'a str,
    },
}

pub trait PromptBuilder: Send + Sync {
    fn build(&self, session_id: &str, agent: &ModelConfig, request: &PromptRequest<'_>) -> String;
}
