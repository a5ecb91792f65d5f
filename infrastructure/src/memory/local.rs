//! Keyword scan over a directory of notes.
//!
//! Layout: `<notes_dir>/<scope>/*.md` for scoped notes, with files directly
//! under `<notes_dir>` shared by every scope. Notes are split into
//! paragraphs; a paragraph scores one point per distinct query keyword it
//! contains, and the best paragraphs are returned as snippets.

use async_trait::async_trait;
use conclave_application::ports::memory_search::{MemoryError, MemorySearch};
use conclave_domain::core::string::truncate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const NOTE_EXTENSIONS: &[&str] = &["md", "txt"];
const MAX_SNIPPET_LEN: usize = 500;
const MIN_KEYWORD_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct LocalMemorySearch {
    notes_dir: PathBuf,
    max_snippets: usize,
}

impl LocalMemorySearch {
    pub fn new(notes_dir: impl Into<PathBuf>, max_snippets: usize) -> Self {
        Self {
            notes_dir: notes_dir.into(),
            max_snippets: max_snippets.max(1),
        }
    }

    fn scan(&self, scope: &str, query: &str) -> Result<Vec<String>, MemoryError> {
        if scope.contains(['/', '\\']) || scope.contains("..") {
            return Err(MemoryError::Failed(format!("invalid scope '{}'", scope)));
        }

        let keywords = keywords(query);
        if keywords.is_empty() || !self.notes_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = note_files(&self.notes_dir);
        let scoped = self.notes_dir.join(scope);
        if !scope.is_empty() && scoped.is_dir() {
            files.extend(note_files(&scoped));
        }

        let mut scored: Vec<(usize, String)> = Vec::new();
        for file in files {
            let content = fs::read_to_string(&file)
                .map_err(|e| MemoryError::Failed(format!("{}: {}", file.display(), e)))?;
            let label = file
                .strip_prefix(&self.notes_dir)
                .unwrap_or(&file)
                .display()
                .to_string();

            for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                let lower = paragraph.to_lowercase();
                let score = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
                if score > 0 {
                    let snippet = truncate(paragraph, MAX_SNIPPET_LEN);
                    scored.push((score, format!("[{}] {}", label, snippet)));
                }
            }
        }

        // Stable: equal scores keep file order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.max_snippets);
        debug!("Memory scan in scope '{}' found {} snippets", scope, scored.len());
        Ok(scored.into_iter().map(|(_, snippet)| snippet).collect())
    }
}

fn keywords(query: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in query.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        let word = word.to_lowercase();
        if word.chars().count() >= MIN_KEYWORD_LEN && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

fn note_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = read
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| NOTE_EXTENSIONS.contains(&e))
        })
        .collect();
    files.sort();
    files
}

#[async_trait]
impl MemorySearch for LocalMemorySearch {
    async fn search(&self, scope: &str, query: &str) -> Result<Vec<String>, MemoryError> {
        let this = self.clone();
        let scope = scope.to_string();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || this.scan(&scope, &query))
            .await
            .map_err(|e| MemoryError::Failed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn notes() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("conventions.md"),
            "# Conventions\n\nAll errors use thiserror enums.\n\n\
             Logging goes through tracing macros.",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("billing")).unwrap();
        fs::write(
            dir.path().join("billing/decisions.md"),
            "Invoices are immutable once sent.\n\n\
             Retry failed invoice errors with tracing enabled.",
        )
        .unwrap();
        fs::write(dir.path().join("billing/ignored.bin"), "errors").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_scoped_search_ranks_by_keyword_hits() {
        let dir = notes();
        let memory = LocalMemorySearch::new(dir.path(), 5);

        let snippets = memory
            .search("billing", "invoice errors and tracing")
            .await
            .unwrap();

        assert_eq!(
            snippets[0],
            "[billing/decisions.md] Retry failed invoice errors with tracing enabled."
        );
        assert_eq!(snippets.len(), 4);
    }

    #[tokio::test]
    async fn test_other_scope_sees_shared_notes_only() {
        let dir = notes();
        let memory = LocalMemorySearch::new(dir.path(), 5);

        let snippets = memory.search("project", "invoice errors").await.unwrap();
        assert_eq!(
            snippets,
            vec!["[conventions.md] All errors use thiserror enums.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_limits_and_edge_cases() {
        let dir = notes();
        let memory = LocalMemorySearch::new(dir.path(), 1);
        assert_eq!(memory.search("billing", "errors tracing").await.unwrap().len(), 1);
        assert!(memory.search("billing", "a an the").await.unwrap().is_empty());
        assert!(memory.search("../etc", "errors").await.is_err());

        let missing = LocalMemorySearch::new(dir.path().join("nope"), 5);
        assert!(missing.search("project", "errors").await.unwrap().is_empty());
    }
}
