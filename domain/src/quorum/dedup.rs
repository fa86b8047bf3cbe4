//! Dedup engine.
//!
//! Merges near-duplicate findings reported by different agents into a single
//! issue whose thread records every reporter. Duplicates must share a file
//! and have similar titles (word-overlap ratio ≥ [`TITLE_SIMILARITY_THRESHOLD`]).

use crate::core::string::word_tokens;
use crate::issue::entities::{Issue, Opinion, OpinionAction};
use std::collections::HashSet;

/// Word-overlap ratio at which two titles are considered the same finding
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Prefix on the reasoning of opinions synthesized from merged duplicates
pub const MERGED_PREFIX: &str = "[merged duplicate]";

/// Word-overlap similarity: `|A ∩ B| / min(|A|, |B|)` over lower-cased words.
///
/// Returns 0.0 when either title has no words.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = word_tokens(a).collect();
    let words_b: HashSet<String> = word_tokens(b).collect();
    let smaller = words_a.len().min(words_b.len());
    if smaller == 0 {
        return 0.0;
    }
    let overlap = words_a.intersection(&words_b).count();
    overlap as f64 / smaller as f64
}

pub fn titles_similar(a: &str, b: &str) -> bool {
    title_similarity(a, b) >= TITLE_SIMILARITY_THRESHOLD
}

/// Whether `candidate` duplicates `primary`.
///
/// Same file is always required. Findings within a few lines of each other
/// still need similar titles, and similar titles match at any distance, so
/// the title test alone decides.
pub fn is_duplicate(primary: &Issue, candidate: &Issue) -> bool {
    primary.file == candidate.file && titles_similar(&primary.title, &candidate.title)
}

/// Collapse duplicates in a single forward pass.
///
/// The first issue of each group survives. It takes the highest severity in
/// the group, and gains one `fix_required` opinion per merged duplicate on
/// behalf of that duplicate's raiser, unless the raiser is already in its
/// thread. Surviving issues keep their relative order.
pub fn deduplicate(issues: Vec<Issue>) -> Vec<Issue> {
    let mut merged = vec![false; issues.len()];
    let mut survivors = Vec::with_capacity(issues.len());

    for i in 0..issues.len() {
        if merged[i] {
            continue;
        }
        let mut primary = issues[i].clone();

        for j in (i + 1)..issues.len() {
            if merged[j] || !is_duplicate(&primary, &issues[j]) {
                continue;
            }
            merged[j] = true;
            let duplicate = &issues[j];

            if duplicate.severity > primary.severity {
                primary.severity = duplicate.severity;
            }

            if primary.has_participant(&duplicate.raised_by) {
                continue;
            }
            let opinion = Opinion::new(
                duplicate.raised_by.clone(),
                OpinionAction::FixRequired,
                format!("{} {}", MERGED_PREFIX, duplicate.title),
                primary.turn,
            )
            .with_severity(duplicate.severity);
            primary.push_opinion(opinion);
        }

        survivors.push(primary);
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::entities::Severity;

    fn issue(id: &str, agent: &str, title: &str, file: &str, line: u32) -> Issue {
        Issue::raised(id, agent, title, Severity::Medium, file).with_lines(line, None)
    }

    #[test]
    fn test_title_similarity() {
        assert_eq!(title_similarity("Missing auth check", "Auth check missing"), 1.0);
        assert_eq!(title_similarity("Null deref", "Null pointer in parser"), 0.5);
        assert_eq!(title_similarity("", "anything"), 0.0);
        assert_eq!(title_similarity("!!!", "!!!"), 0.0);
        assert!(!titles_similar("Race in cache", "SQL injection risk"));
    }

    #[test]
    fn test_merges_similar_titles_on_same_file() {
        let a = issue("issue-1", "codex1", "Missing auth check", "X", 42);
        let b = issue("issue-2", "claude1", "Auth check missing", "X", 44);

        let result = deduplicate(vec![a, b]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "issue-1");
        assert_eq!(result[0].thread.len(), 2);
        let merged = &result[0].thread[1];
        assert_eq!(merged.agent_id, "claude1");
        assert_eq!(merged.action, OpinionAction::FixRequired);
        assert!(merged.reasoning.starts_with(MERGED_PREFIX));
    }

    #[test]
    fn test_different_file_never_merges() {
        let a = issue("issue-1", "codex1", "Missing auth check", "X", 42);
        let b = issue("issue-2", "claude1", "Auth check missing", "X", 44);
        let c = issue("issue-3", "gemini1", "Missing auth check", "Y", 42);

        let result = deduplicate(vec![a, b, c]);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].thread.len(), 2);
        assert_eq!(result[1].id, "issue-3");
        assert_eq!(result[1].thread.len(), 1);
    }

    #[test]
    fn test_similar_titles_merge_regardless_of_distance() {
        let a = issue("issue-1", "a", "Unchecked unwrap in handler", "X", 10);
        let b = issue("issue-2", "b", "Unchecked unwrap", "X", 300);
        assert_eq!(deduplicate(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_nearby_lines_alone_do_not_merge() {
        let a = issue("issue-1", "a", "Race condition in cache", "X", 10);
        let b = issue("issue-2", "b", "Wrong log level", "X", 11);
        assert_eq!(deduplicate(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_no_self_agreement() {
        let a = issue("issue-1", "codex1", "Missing auth check", "X", 42);
        let b = issue("issue-2", "codex1", "Auth check missing", "X", 44);

        let result = deduplicate(vec![a, b]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].thread.len(), 1);
    }

    #[test]
    fn test_keeps_highest_severity() {
        let a = issue("issue-1", "a", "Missing auth check", "X", 42);
        let mut b = issue("issue-2", "b", "Auth check missing", "X", 44);
        b.severity = Severity::Critical;

        let result = deduplicate(vec![a, b]);
        assert_eq!(result[0].severity, Severity::Critical);
    }

    #[test]
    fn test_preserves_survivor_order() {
        let issues = vec![
            issue("issue-1", "a", "Alpha bug", "A", 1),
            issue("issue-2", "b", "Beta bug", "B", 1),
            issue("issue-3", "c", "Alpha bug again", "A", 2),
            issue("issue-4", "c", "Gamma bug", "C", 1),
        ];
        let ids: Vec<String> = deduplicate(issues).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["issue-1", "issue-2", "issue-4"]);
    }

    #[test]
    fn test_one_opinion_per_distinct_duplicate_raiser() {
        let issues = vec![
            issue("issue-1", "a", "Missing auth check", "X", 1),
            issue("issue-2", "b", "Auth check missing", "X", 2),
            issue("issue-3", "b", "Missing auth check here", "X", 3),
        ];
        let result = deduplicate(issues);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].thread.len(), 2);
    }
}
