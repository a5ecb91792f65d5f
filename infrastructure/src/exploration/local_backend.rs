//! Deterministic exploration sub-agent over the local workspace.

use crate::tools::search::grep_files;
use crate::tools::workspace::{Workspace, is_skipped_dir};
use async_trait::async_trait;
use conclave_application::ports::exploration_backend::ExplorationBackend;
use conclave_domain::core::string::prefix;
use conclave_domain::exploration::auto_pattern;
use conclave_domain::{SubQuery, SubQueryTool};
use glob::Pattern;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

const MAX_GREP_HITS: usize = 30;
const MAX_READ_FILES: usize = 5;
const MAX_READ_LINES: usize = 200;
const AUTO_READ_FILES: usize = 3;
const AUTO_READ_CHARS: usize = 1000;
const STRUCTURE_DEPTH: usize = 3;
const STRUCTURE_FILES_PER_DIR: usize = 30;
const STRUCTURE_MAX_LINES: usize = 150;

/// Answers sub-queries with grep, file reads and structure listings.
#[derive(Debug, Clone)]
pub struct LocalExplorationBackend {
    workspace: Workspace,
}

impl LocalExplorationBackend {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    fn answer(&self, query: &SubQuery) -> String {
        let mut sections = Vec::new();

        match query.tool {
            SubQueryTool::Read => {
                if query.files.is_empty() {
                    sections.push("[ERROR] read: no files given".to_string());
                }
                for file in query.files.iter().take(MAX_READ_FILES) {
                    sections.push(self.read(file, None));
                }
            }
            SubQueryTool::Grep => {
                let pattern = query
                    .pattern
                    .clone()
                    .or_else(|| auto_pattern(&query.query))
                    .unwrap_or_else(|| regex::escape(&query.query));
                sections.push(self.grep(&pattern, query.glob.as_deref()));
            }
            SubQueryTool::Structure => {
                let root = query.files.first().map(String::as_str).unwrap_or(".");
                sections.push(self.structure(root));
            }
            SubQueryTool::Auto => {
                let pattern = query.pattern.clone().or_else(|| auto_pattern(&query.query));
                if let Some(pattern) = pattern {
                    sections.push(self.grep(&pattern, query.glob.as_deref()));
                }
                for file in query.files.iter().take(AUTO_READ_FILES) {
                    sections.push(self.read(file, Some(AUTO_READ_CHARS)));
                }
            }
        }

        if sections.is_empty() {
            format!("No results for: {}", query.query)
        } else {
            sections.join("\n\n")
        }
    }

    fn grep(&self, pattern: &str, glob: Option<&str>) -> String {
        let regex = match Regex::new(&format!("(?i){}", pattern)) {
            Ok(r) => r,
            // Treat an invalid regex as a literal
            Err(_) => match Regex::new(&format!("(?i){}", regex::escape(pattern))) {
                Ok(r) => r,
                Err(e) => return format!("[ERROR] grep '{}': {}", pattern, e),
            },
        };
        let filter = match glob.map(Pattern::new).transpose() {
            Ok(f) => f,
            Err(e) => return format!("[ERROR] grep '{}': invalid glob: {}", pattern, e),
        };

        let hits = grep_files(
            &self.workspace,
            self.workspace.root(),
            &regex,
            filter.as_ref(),
            0,
            MAX_GREP_HITS,
        );
        if hits.is_empty() {
            format!("grep '{}': no matches", pattern)
        } else {
            format!("grep '{}' ({} matches):\n{}", pattern, hits.len(), hits.join("\n"))
        }
    }

    fn read(&self, file: &str, max_chars: Option<usize>) -> String {
        let path = match self.workspace.resolve(file) {
            Ok(p) => p,
            Err(e) => return format!("[ERROR] read {}: {}", file, e.message),
        };
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => return format!("[ERROR] read {}: {}", file, e),
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut body = lines
            .iter()
            .take(MAX_READ_LINES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if lines.len() > MAX_READ_LINES {
            body.push_str(&format!("\n... ({} lines total, truncated)", lines.len()));
        }
        if let Some(max) = max_chars {
            body = prefix(&body, max).to_string();
        }
        format!("[FILE] {}:\n{}", file, body)
    }

    fn structure(&self, root: &str) -> String {
        let dir = match self.workspace.resolve(root) {
            Ok(p) => p,
            Err(e) => return format!("[ERROR] structure {}: {}", root, e.message),
        };
        if !dir.is_dir() {
            return format!("[ERROR] structure {}: not a directory", root);
        }

        let mut lines = Vec::new();
        tree(&dir, 0, &mut lines);
        lines.truncate(STRUCTURE_MAX_LINES);
        format!("Structure ({}):\n{}", root, lines.join("\n"))
    }
}

fn tree(dir: &Path, level: usize, lines: &mut Vec<String>) {
    if level >= STRUCTURE_DEPTH || lines.len() >= STRUCTURE_MAX_LINES {
        return;
    }
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(".");
    lines.push(format!("{}{}/", "  ".repeat(level), name));

    let Ok(read) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = read.flatten().map(|e| e.path()).collect();
    entries.sort();

    let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|p| p.is_dir());
    for file in files.iter().take(STRUCTURE_FILES_PER_DIR) {
        if let Some(file_name) = file.file_name().and_then(|n| n.to_str()) {
            lines.push(format!("{}{}", "  ".repeat(level + 1), file_name));
        }
    }
    for sub in dirs.iter().filter(|d| !is_skipped_dir(d)) {
        tree(sub, level + 1, lines);
    }
}

#[async_trait]
impl ExplorationBackend for LocalExplorationBackend {
    async fn run(&self, query: &SubQuery) -> String {
        debug!(tool = ?query.tool, "Sub-query: {}", query.query);
        let backend = self.clone();
        let query = query.clone();
        match tokio::task::spawn_blocking(move || backend.answer(&query)).await {
            Ok(text) => text,
            Err(e) => format!("[ERROR] sub-query failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn backend() -> (tempfile::TempDir, LocalExplorationBackend) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/session")).unwrap();
        fs::create_dir_all(dir.path().join("target")).unwrap();
        fs::write(
            dir.path().join("src/session/manager.rs"),
            "pub struct SessionManager;\nimpl SessionManager {}\n",
        )
        .unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub mod session;\n").unwrap();
        fs::write(dir.path().join("target/junk.rs"), "SessionManager").unwrap();
        let long: String = (1..=250).map(|i| format!("line {}\n", i)).collect();
        fs::write(dir.path().join("long.txt"), long).unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        (dir, LocalExplorationBackend::new(ws))
    }

    #[tokio::test]
    async fn test_grep_is_case_insensitive_and_skips_target() {
        let (_dir, backend) = backend();
        let query = SubQuery::new(SubQueryTool::Grep, "who manages sessions")
            .with_pattern("sessionmanager");
        let text = backend.run(&query).await;

        assert!(text.starts_with("grep 'sessionmanager' (2 matches):"));
        assert!(text.contains("src/session/manager.rs:1:"));
        assert!(!text.contains("target/"));
    }

    #[tokio::test]
    async fn test_read_truncates_long_files() {
        let (_dir, backend) = backend();
        let query = SubQuery::new(SubQueryTool::Read, "read it")
            .with_files(vec!["long.txt".to_string(), "missing.rs".to_string()]);
        let text = backend.run(&query).await;

        assert!(text.contains("[FILE] long.txt:\nline 1\n"));
        assert!(text.contains("line 200\n... (250 lines total, truncated)"));
        assert!(!text.contains("line 201"));
        assert!(text.contains("[ERROR] read missing.rs:"));
    }

    #[tokio::test]
    async fn test_read_outside_workspace_is_reported() {
        let (_dir, backend) = backend();
        let query = SubQuery::new(SubQueryTool::Read, "escape")
            .with_files(vec!["../../etc/passwd".to_string()]);
        let text = backend.run(&query).await;

        assert!(text.starts_with("[ERROR] read ../../etc/passwd: Permission denied"));
    }

    #[tokio::test]
    async fn test_structure_lists_tree() {
        let (_dir, backend) = backend();
        let query = SubQuery::new(SubQueryTool::Structure, "layout")
            .with_files(vec!["src".to_string()]);
        let text = backend.run(&query).await;

        assert_eq!(
            text,
            "Structure (src):\nsrc/\n  lib.rs\n  session/\n    manager.rs"
        );
    }

    #[tokio::test]
    async fn test_auto_builds_keyword_grep() {
        let (_dir, backend) = backend();
        let query = SubQuery::new(SubQueryTool::Auto, "find the SessionManager impl");
        let text = backend.run(&query).await;

        assert!(text.starts_with("grep 'find|SessionManager|impl' ("));
        assert!(text.contains("src/session/manager.rs"));
    }

    #[tokio::test]
    async fn test_auto_without_keywords() {
        let (_dir, backend) = backend();
        let query = SubQuery::new(SubQueryTool::Auto, "a b");
        assert_eq!(backend.run(&query).await, "No results for: a b");
    }
}
