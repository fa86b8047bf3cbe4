//! Tool-use events → `(action, target)` pairs for live progress.
//!
//! Each CLI names its tools differently; progress rendering only cares about
//! four kinds of activity.

use serde_json::Value;

pub const READ: &str = "read";
pub const SEARCH: &str = "search";
pub const LIST: &str = "list";
pub const RUN: &str = "run";

/// Longest target passed to the activity sink
const MAX_TARGET_LEN: usize = 120;

/// Map a tool invocation onto a normalized action and its target.
///
/// Returns `None` for tools that are not worth reporting (edits, todo
/// lists, web fetches...).
pub fn classify_tool(name: &str, input: &Value) -> Option<(&'static str, String)> {
    let action = match name.to_lowercase().as_str() {
        "read" | "read_file" | "read_many_files" | "view" | "cat" => READ,
        "grep" | "glob" | "search" | "search_file_content" | "grep_search" | "find" => SEARCH,
        "ls" | "list_directory" | "list_dir" | "list" => LIST,
        "bash" | "shell" | "run_shell_command" | "command_execution" | "exec" | "local_shell" => {
            RUN
        }
        _ => return None,
    };
    let target = target_of(input).unwrap_or_default();
    Some((action, shorten(&target)))
}

/// The most descriptive argument of a tool call
fn target_of(input: &Value) -> Option<String> {
    const KEYS: [&str; 8] = [
        "file_path",
        "absolute_path",
        "path",
        "pattern",
        "query",
        "command",
        "cmd",
        "dir_path",
    ];
    for key in KEYS {
        match input.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Array(parts)) => {
                let joined = parts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            _ => {}
        }
    }
    None
}

fn shorten(target: &str) -> String {
    let single_line = target.lines().next().unwrap_or_default();
    if single_line.chars().count() <= MAX_TARGET_LEN {
        return single_line.to_string();
    }
    let mut out: String = single_line.chars().take(MAX_TARGET_LEN).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_known_tools() {
        assert_eq!(
            classify_tool("Read", &json!({"file_path": "src/lib.rs"})),
            Some((READ, "src/lib.rs".to_string()))
        );
        assert_eq!(
            classify_tool("Grep", &json!({"pattern": "unwrap\\(", "path": "src"})),
            Some((SEARCH, "src".to_string()))
        );
        assert_eq!(
            classify_tool("list_directory", &json!({"dir_path": "tests"})),
            Some((LIST, "tests".to_string()))
        );
        assert_eq!(
            classify_tool("command_execution", &json!({"command": ["cargo", "test"]})),
            Some((RUN, "cargo test".to_string()))
        );
    }

    #[test]
    fn test_unreported_tools() {
        assert_eq!(classify_tool("Edit", &json!({"file_path": "a.rs"})), None);
        assert_eq!(classify_tool("TodoWrite", &json!({})), None);
    }

    #[test]
    fn test_target_is_single_line_and_bounded() {
        let (_, target) = classify_tool("Bash", &json!({"command": "echo hi\necho there"})).unwrap();
        assert_eq!(target, "echo hi");

        let long = "x".repeat(500);
        let (_, target) = classify_tool("Bash", &json!({"command": long})).unwrap();
        assert_eq!(target.chars().count(), MAX_TARGET_LEN + 1);
    }
}
