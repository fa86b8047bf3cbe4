//! Consensus engine.
//!
//! Each agent's **first** vote on an issue is the only one that counts:
//! `raise` and `fix_required` agree, `no_fix` disagrees, everything else
//! (comments, disputes, status changes) is not a vote. An issue is settled
//! once either tally reaches the session threshold.
//!
//! Everything here is recomputed from the thread on every call, so
//! [`apply_consensus`] is idempotent and safe to re-run after any submission.

use crate::issue::entities::{ConsensusType, Issue, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// First-vote tally for one issue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub agree: usize,
    pub disagree: usize,
    /// Suggested severities of counted agreeing votes, in thread order
    pub agree_severities: Vec<Severity>,
}

impl VoteTally {
    /// Count each agent's first qualifying vote in `issue`'s thread.
    pub fn from_issue(issue: &Issue) -> Self {
        let mut voted: HashSet<&str> = HashSet::new();
        let mut tally = VoteTally::default();

        for opinion in &issue.thread {
            if !opinion.action.is_vote() || !voted.insert(opinion.agent_id.as_str()) {
                continue;
            }
            if opinion.action.is_agree() {
                tally.agree += 1;
                if let Some(severity) = opinion.suggested_severity {
                    tally.agree_severities.push(severity);
                }
            } else {
                tally.disagree += 1;
            }
        }

        tally
    }

    pub fn reaches(&self, threshold: usize) -> bool {
        self.agree >= threshold || self.disagree >= threshold
    }

    /// Visual summary, e.g. `[●●○]` (agree, agree, disagree)
    pub fn summary(&self) -> String {
        let mut summary = String::from("[");
        summary.extend(std::iter::repeat_n('●', self.agree));
        summary.extend(std::iter::repeat_n('○', self.disagree));
        summary.push(']');
        summary
    }
}

/// Whether `issue` has reached consensus under `threshold`.
pub fn check_consensus(issue: &Issue, threshold: usize) -> bool {
    VoteTally::from_issue(issue).reaches(threshold)
}

/// Resolve the severity an issue should carry.
///
/// Disagreement strictly outnumbering agreement dismisses the issue.
/// Otherwise the most frequent severity suggested by agreeing votes wins,
/// ties going to whichever was suggested first; with no suggestions the
/// originally reported severity stands.
pub fn determine_final_severity(issue: &Issue) -> Severity {
    let tally = VoteTally::from_issue(issue);
    if tally.disagree > tally.agree {
        return Severity::Dismissed;
    }

    let mut counts: Vec<(Severity, usize)> = Vec::new();
    for severity in &tally.agree_severities {
        match counts.iter_mut().find(|(s, _)| s == severity) {
            Some((_, count)) => *count += 1,
            None => counts.push((*severity, 1)),
        }
    }

    // max_by_key keeps the last maximum; fold to keep the first.
    counts
        .into_iter()
        .fold(None::<(Severity, usize)>, |best, (severity, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((severity, count)),
        })
        .map(|(severity, _)| severity)
        .unwrap_or(issue.severity)
}

/// Recompute consensus flag, type and final severity for every issue.
///
/// Issues closed by withdrawal are left alone. Returns the ids of issues
/// whose consensus flag flipped to `true` during this call.
pub fn apply_consensus(issues: &mut [Issue], threshold: usize) -> Vec<String> {
    let mut newly_settled = Vec::new();

    for issue in issues.iter_mut() {
        if issue.is_closed() {
            continue;
        }

        let was_settled = issue.consensus;
        let final_severity = determine_final_severity(issue);
        issue.consensus = check_consensus(issue, threshold);
        issue.final_severity = Some(final_severity);
        issue.consensus_type = match (issue.consensus, final_severity) {
            (false, _) => ConsensusType::Undecided,
            (true, Severity::Dismissed) => ConsensusType::Dismissed,
            (true, _) => ConsensusType::FixRequired,
        };

        if issue.consensus && !was_settled {
            newly_settled.push(issue.id.clone());
        }
    }

    newly_settled
}
