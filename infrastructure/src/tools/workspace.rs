//! Workspace confinement for file and search tools.
//!
//! Every path an agent hands to a tool is resolved against the workspace
//! root. Relative paths are joined onto the root, `..` components are folded
//! lexically, and anything that ends up outside the root is refused with
//! `PERMISSION_DENIED`.

use conclave_domain::tool::ToolError;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Directories never descended into by recursive tools.
pub const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__"];

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace rooted at `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("workspace root is not a directory: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path inside the workspace.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let requested = Path::new(path.trim());
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(ToolError::permission_denied(format!(
                "{} is outside the workspace",
                path
            )));
        }

        // Symlinks may still point outside
        if let Ok(real) = normalized.canonicalize()
            && !real.starts_with(&self.root)
        {
            return Err(ToolError::permission_denied(format!(
                "{} resolves outside the workspace",
                path
            )));
        }

        Ok(normalized)
    }

    /// Path as shown to agents: relative to the root where possible.
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

pub fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Collect files below `dir` in a stable order, skipping [`SKIPPED_DIRS`].
pub fn walk_files(dir: &Path, limit: usize) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let Ok(read) = std::fs::read_dir(&current) else {
            continue;
        };
        let mut entries: Vec<PathBuf> = read.flatten().map(|e| e.path()).collect();
        entries.sort();

        let mut subdirs = Vec::new();
        for entry in entries {
            if entry.is_dir() {
                if !is_skipped_dir(&entry) {
                    subdirs.push(entry);
                }
            } else if entry.is_file() {
                files.push(entry);
                if files.len() >= limit {
                    return files;
                }
            }
        }
        // Reverse so the stack pops them in sorted order
        pending.extend(subdirs.into_iter().rev());
    }

    files
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();

        let rel = ws.resolve("src/lib.rs").unwrap();
        assert_eq!(rel, ws.root().join("src/lib.rs"));

        let abs = ws.resolve(ws.root().join("a.txt").to_str().unwrap()).unwrap();
        assert_eq!(ws.display(&abs), "a.txt");
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();

        let err = ws.resolve("../outside.txt").unwrap_err();
        assert_eq!(err.code, "PERMISSION_DENIED");
        assert_eq!(ws.resolve("/etc/passwd").unwrap_err().code, "PERMISSION_DENIED");
        assert!(ws.resolve("src/../README.md").is_ok());
    }

    #[test]
    fn test_walk_skips_vendor_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("target/debug/out"), "bin").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

        let ws = Workspace::new(dir.path()).unwrap();
        let files: Vec<String> = walk_files(ws.root(), 100)
            .iter()
            .map(|p| ws.display(p))
            .collect();
        assert_eq!(files, vec!["Cargo.toml".to_string(), "src/main.rs".to_string()]);
    }
}
