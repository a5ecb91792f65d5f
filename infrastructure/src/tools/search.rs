//! Search tools: glob_search, grep_search

use super::workspace::{Workspace, walk_files};
use conclave_domain::tool::{ToolCall, ToolDefinition, ToolError, ToolParameter, ToolResult};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Tool name constants
pub const GLOB_SEARCH: &str = "glob_search";
pub const GREP_SEARCH: &str = "grep_search";

/// Maximum number of results to return
const MAX_RESULTS: usize = 1000;

/// Files visited by a single search
const MAX_FILES: usize = 20_000;

/// Maximum file size for grep (5 MB)
const MAX_GREP_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub fn glob_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        GLOB_SEARCH,
        "Search for workspace files matching a glob pattern (e.g., '**/*.rs', 'src/*.txt')",
    )
    .with_parameter(ToolParameter::new("pattern", "Glob pattern to match files", true))
    .with_parameter(
        ToolParameter::new(
            "base_dir",
            "Directory to search from (default: workspace root)",
            false,
        )
        .with_type("path"),
    )
    .with_parameter(
        ToolParameter::new(
            "max_results",
            "Maximum number of results to return (default: 1000)",
            false,
        )
        .with_type("integer"),
    )
}

pub fn grep_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        GREP_SEARCH,
        "Search for a regex pattern within workspace file contents",
    )
    .with_parameter(ToolParameter::new("pattern", "Regex pattern to search for", true))
    .with_parameter(
        ToolParameter::new(
            "path",
            "File or directory to search in (default: workspace root)",
            false,
        )
        .with_type("path"),
    )
    .with_parameter(ToolParameter::new(
        "file_pattern",
        "Glob pattern to filter files (e.g., '*.rs')",
        false,
    ))
    .with_parameter(
        ToolParameter::new(
            "context_lines",
            "Number of context lines before and after match",
            false,
        )
        .with_type("integer"),
    )
    .with_parameter(
        ToolParameter::new("case_insensitive", "Perform case-insensitive search", false)
            .with_type("boolean"),
    )
}

pub fn execute_glob_search(workspace: &Workspace, call: &ToolCall) -> ToolResult {
    let start = Instant::now();

    let pattern_str = match call.require_string("pattern") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(GLOB_SEARCH, ToolError::invalid_argument(e)),
    };
    let pattern = match Pattern::new(pattern_str.trim_start_matches("./")) {
        Ok(p) => p,
        Err(e) => {
            return ToolResult::failure(
                GLOB_SEARCH,
                ToolError::invalid_argument(format!("Invalid glob pattern: {}", e)),
            );
        }
    };
    let base = match workspace.resolve(call.get_string("base_dir").unwrap_or(".")) {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(GLOB_SEARCH, e),
    };
    if !base.is_dir() {
        return ToolResult::failure(
            GLOB_SEARCH,
            ToolError::not_found(call.get_string("base_dir").unwrap_or(".")),
        );
    }

    let max_results = call
        .get_i64("max_results")
        .map(|n| n.max(1) as usize)
        .unwrap_or(MAX_RESULTS)
        .min(MAX_RESULTS);

    let results: Vec<String> = walk_files(&base, MAX_FILES)
        .into_iter()
        .filter(|path| {
            path.strip_prefix(&base)
                .is_ok_and(|rel| pattern.matches_path_with(rel, path_match_options()))
        })
        .take(max_results)
        .map(|path| workspace.display(&path))
        .collect();

    let match_count = results.len();
    let output = if results.is_empty() {
        "No files found matching the pattern".to_string()
    } else if match_count >= max_results {
        format!(
            "{}\n... (limited to {} results)",
            results.join("\n"),
            max_results
        )
    } else {
        results.join("\n")
    };

    ToolResult::success(GLOB_SEARCH, output)
        .with_duration(start.elapsed().as_millis() as u64)
        .with_match_count(match_count)
}

pub fn execute_grep_search(workspace: &Workspace, call: &ToolCall) -> ToolResult {
    let start = Instant::now();

    let pattern_str = match call.require_string("pattern") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(GREP_SEARCH, ToolError::invalid_argument(e)),
    };
    let path_str = call.get_string("path").unwrap_or(".");
    let path = match workspace.resolve(path_str) {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(GREP_SEARCH, e),
    };
    if !path.exists() {
        return ToolResult::failure(GREP_SEARCH, ToolError::not_found(path_str));
    }

    let file_pattern = match call.get_string("file_pattern").map(Pattern::new).transpose() {
        Ok(p) => p,
        Err(e) => {
            return ToolResult::failure(
                GREP_SEARCH,
                ToolError::invalid_argument(format!("Invalid file pattern: {}", e)),
            );
        }
    };
    let context_lines = call.get_i64("context_lines").unwrap_or(0).max(0) as usize;
    let case_insensitive = call.get_bool("case_insensitive").unwrap_or(false);

    let regex_pattern = if case_insensitive {
        format!("(?i){}", pattern_str)
    } else {
        pattern_str.to_string()
    };
    let regex = match Regex::new(&regex_pattern) {
        Ok(r) => r,
        Err(e) => {
            return ToolResult::failure(
                GREP_SEARCH,
                ToolError::invalid_argument(format!("Invalid regex pattern: {}", e)),
            );
        }
    };

    let hits = grep_files(
        workspace,
        &path,
        &regex,
        file_pattern.as_ref(),
        context_lines,
        MAX_RESULTS,
    );

    let match_count = hits.len();
    let output = if hits.is_empty() {
        "No matches found".to_string()
    } else if match_count >= MAX_RESULTS {
        format!("{}\n... (limited to {} matches)", hits.join("\n"), MAX_RESULTS)
    } else {
        hits.join("\n")
    };

    ToolResult::success(GREP_SEARCH, output)
        .with_duration(start.elapsed().as_millis() as u64)
        .with_match_count(match_count)
}

/// Search `path` (a file or directory) line by line.
///
/// Hits are rendered `file:line: text`, or as a context block when
/// `context_lines > 0`. Vendor and build directories are never read.
pub fn grep_files(
    workspace: &Workspace,
    path: &Path,
    regex: &Regex,
    file_pattern: Option<&Pattern>,
    context_lines: usize,
    max_hits: usize,
) -> Vec<String> {
    let files = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        walk_files(path, MAX_FILES)
    };

    let mut hits = Vec::new();
    for file in files {
        if let Some(pattern) = file_pattern {
            let name_matches = file
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| pattern.matches(n));
            let rel_matches = file
                .strip_prefix(path)
                .is_ok_and(|rel| pattern.matches_path_with(rel, path_match_options()));
            if !name_matches && !rel_matches {
                continue;
            }
        }
        if fs::metadata(&file).is_ok_and(|m| m.len() > MAX_GREP_FILE_SIZE) {
            continue;
        }
        // Binary or non-UTF-8 files are skipped
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };

        let display = workspace.display(&file);
        let lines: Vec<&str> = content.lines().collect();
        for (idx, line) in lines.iter().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if context_lines > 0 {
                let from = idx.saturating_sub(context_lines);
                let to = (idx + context_lines + 1).min(lines.len());
                let mut block = format!("{}:", display);
                for (offset, ctx) in lines[from..to].iter().enumerate() {
                    let n = from + offset;
                    let marker = if n == idx { ">" } else { " " };
                    block.push_str(&format!("\n{}{}: {}", marker, n + 1, ctx));
                }
                hits.push(block);
            } else {
                hits.push(format!("{}:{}: {}", display, idx + 1, line.trim_end()));
            }
            if hits.len() >= max_hits {
                return hits;
            }
        }
    }
    hits
}

fn path_match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(
            dir.path().join("src/lib.rs"),
            "pub fn token() {}\n// TODO refresh Token\n",
        )
        .unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "token budget\n").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "token").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_glob_search_basic() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(GLOB_SEARCH).with_arg("pattern", "**/*.rs");
        let result = execute_glob_search(&ws, &call);

        assert_eq!(result.output(), Some("src/lib.rs\nsrc/main.rs"));
        assert_eq!(result.match_count, Some(2));
    }

    #[test]
    fn test_glob_search_base_dir_and_no_match() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(GLOB_SEARCH)
            .with_arg("pattern", "*.rs")
            .with_arg("base_dir", "src");
        assert_eq!(
            execute_glob_search(&ws, &call).output(),
            Some("src/lib.rs\nsrc/main.rs")
        );

        let none = ToolCall::new(GLOB_SEARCH).with_arg("pattern", "*.py");
        assert_eq!(
            execute_glob_search(&ws, &none).output(),
            Some("No files found matching the pattern")
        );
    }

    #[test]
    fn test_grep_search_skips_vendor_dirs() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(GREP_SEARCH).with_arg("pattern", "token");
        let result = execute_grep_search(&ws, &call);

        let output = result.output().unwrap();
        assert!(output.contains("src/lib.rs:1: pub fn token() {}"));
        assert!(output.contains("notes.txt:1: token budget"));
        assert!(!output.contains("node_modules"));
        assert_eq!(result.match_count, Some(2));
    }

    #[test]
    fn test_grep_search_case_insensitive_with_filter() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(GREP_SEARCH)
            .with_arg("pattern", "token")
            .with_arg("file_pattern", "*.rs")
            .with_arg("case_insensitive", true);
        let result = execute_grep_search(&ws, &call);

        assert_eq!(result.match_count, Some(2));
        assert!(!result.output().unwrap().contains("notes.txt"));
    }

    #[test]
    fn test_grep_search_context_and_errors() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(GREP_SEARCH)
            .with_arg("pattern", "TODO")
            .with_arg("path", "src/lib.rs")
            .with_arg("context_lines", 1i64);
        assert_eq!(
            execute_grep_search(&ws, &call).output(),
            Some("src/lib.rs:\n 1: pub fn token() {}\n>2: // TODO refresh Token")
        );

        let bad = ToolCall::new(GREP_SEARCH).with_arg("pattern", "(unclosed");
        assert_eq!(
            execute_grep_search(&ws, &bad).error().unwrap().code,
            "INVALID_ARGUMENT"
        );
    }
}
