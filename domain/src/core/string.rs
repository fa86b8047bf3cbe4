//! String utilities for the domain layer.

/// Truncate a string to a maximum byte length with ellipsis (UTF-8 safe).
///
/// Used to bound the observability fields on [`AgentState`](crate::agent::state::AgentState)
/// so a chatty agent cannot grow a session record without limit.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Lower-cased word tokens of a title, split on anything that is not alphanumeric.
pub fn word_tokens(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        // 'é' is 2 bytes; cutting inside it must back up
        let s = "ééééé";
        assert_eq!(truncate(s, 6), "é...");
    }

    #[test]
    fn test_word_tokens() {
        let words: Vec<String> = word_tokens("Missing AUTH-check, again!").collect();
        assert_eq!(words, vec!["missing", "auth", "check", "again"]);
        assert_eq!(word_tokens("  --  ").count(), 0);
    }
}
