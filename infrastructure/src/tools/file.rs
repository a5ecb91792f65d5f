//! File operation tools: read_file, write_file, list_files

use super::workspace::{Workspace, is_skipped_dir};
use conclave_domain::tool::{ToolCall, ToolDefinition, ToolError, ToolParameter, ToolResult};
use std::fs;
use std::time::Instant;

/// Tool name constants
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_FILES: &str = "list_files";

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum entries returned by list_files
const MAX_LIST_ENTRIES: usize = 500;

pub fn read_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        READ_FILE,
        "Read the contents of a file in the workspace",
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to read", true).with_type("path"))
    .with_parameter(
        ToolParameter::new(
            "offset",
            "Line number to start reading from (0-indexed)",
            false,
        )
        .with_type("integer"),
    )
    .with_parameter(
        ToolParameter::new("limit", "Maximum number of lines to read", false).with_type("integer"),
    )
}

pub fn write_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        WRITE_FILE,
        "Write content to a file in the workspace. \
         Creates the file if it doesn't exist, or overwrites if it does.",
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to write", true).with_type("path"))
    .with_parameter(ToolParameter::new("content", "Content to write to the file", true))
    .with_parameter(
        ToolParameter::new("create_dirs", "Create parent directories if they don't exist", false)
            .with_type("boolean"),
    )
}

pub fn list_files_definition() -> ToolDefinition {
    ToolDefinition::new(
        LIST_FILES,
        "List the entries of a workspace directory. Directories end with '/'.",
    )
    .with_parameter(
        ToolParameter::new("path", "Directory to list (default: workspace root)", false)
            .with_type("path"),
    )
    .with_parameter(
        ToolParameter::new("recursive", "Descend into subdirectories", false).with_type("boolean"),
    )
}

pub fn execute_read_file(workspace: &Workspace, call: &ToolCall) -> ToolResult {
    let start = Instant::now();

    let path_str = match call.require_string("path") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(READ_FILE, ToolError::invalid_argument(e)),
    };
    let path = match workspace.resolve(path_str) {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(READ_FILE, e),
    };

    if !path.exists() {
        return ToolResult::failure(READ_FILE, ToolError::not_found(path_str));
    }
    if !path.is_file() {
        return ToolResult::failure(
            READ_FILE,
            ToolError::invalid_argument(format!("'{}' is not a file", path_str)),
        );
    }

    let metadata = match fs::metadata(&path) {
        Ok(m) => m,
        Err(e) => {
            return ToolResult::failure(
                READ_FILE,
                ToolError::execution_failed(format!("Failed to get file metadata: {}", e)),
            );
        }
    };
    if metadata.len() > MAX_READ_SIZE {
        return ToolResult::failure(
            READ_FILE,
            ToolError::invalid_argument(format!(
                "File too large ({} bytes). Maximum size is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            )),
        );
    }

    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return ToolResult::failure(READ_FILE, ToolError::permission_denied(path_str));
        }
        Err(e) => {
            return ToolResult::failure(
                READ_FILE,
                ToolError::execution_failed(format!("Failed to read file: {}", e)),
            );
        }
    };

    let offset = call.get_i64("offset").unwrap_or(0).max(0) as usize;
    let limit = call.get_i64("limit").map(|l| l.max(0) as usize);

    let output = if offset > 0 || limit.is_some() {
        let lines: Vec<&str> = content.lines().collect();
        if offset >= lines.len() {
            String::new()
        } else {
            let end = limit.map_or(lines.len(), |l| (offset + l).min(lines.len()));
            lines[offset..end].join("\n")
        }
    } else {
        content
    };

    ToolResult::success(READ_FILE, output).with_duration(start.elapsed().as_millis() as u64)
}

pub fn execute_write_file(workspace: &Workspace, call: &ToolCall) -> ToolResult {
    let start = Instant::now();

    let path_str = match call.require_string("path") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(WRITE_FILE, ToolError::invalid_argument(e)),
    };
    let content = match call.require_string("content") {
        Ok(c) => c,
        Err(e) => return ToolResult::failure(WRITE_FILE, ToolError::invalid_argument(e)),
    };
    let path = match workspace.resolve(path_str) {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(WRITE_FILE, e),
    };

    let create_dirs = call.get_bool("create_dirs").unwrap_or(false);
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        if !create_dirs {
            return ToolResult::failure(
                WRITE_FILE,
                ToolError::not_found(format!(
                    "Parent directory does not exist: {}",
                    workspace.display(parent)
                )),
            );
        }
        if let Err(e) = fs::create_dir_all(parent) {
            return ToolResult::failure(
                WRITE_FILE,
                ToolError::execution_failed(format!("Failed to create parent directories: {}", e)),
            );
        }
    }

    let bytes = content.len();
    if let Err(e) = fs::write(&path, content) {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            return ToolResult::failure(WRITE_FILE, ToolError::permission_denied(path_str));
        }
        return ToolResult::failure(
            WRITE_FILE,
            ToolError::execution_failed(format!("Failed to write file: {}", e)),
        );
    }

    ToolResult::success(
        WRITE_FILE,
        format!("Successfully wrote {} bytes to {}", bytes, workspace.display(&path)),
    )
    .with_duration(start.elapsed().as_millis() as u64)
}

pub fn execute_list_files(workspace: &Workspace, call: &ToolCall) -> ToolResult {
    let start = Instant::now();

    let path_str = call.get_string("path").unwrap_or(".");
    let dir = match workspace.resolve(path_str) {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(LIST_FILES, e),
    };
    if !dir.is_dir() {
        return ToolResult::failure(LIST_FILES, ToolError::not_found(path_str));
    }

    let recursive = call.get_bool("recursive").unwrap_or(false);
    let mut entries = Vec::new();
    let mut pending = vec![dir];
    let mut truncated = false;

    'walk: while let Some(current) = pending.pop() {
        let read = match fs::read_dir(&current) {
            Ok(r) => r,
            Err(e) => {
                return ToolResult::failure(
                    LIST_FILES,
                    ToolError::execution_failed(format!("Failed to list directory: {}", e)),
                );
            }
        };
        let mut children: Vec<_> = read.flatten().map(|e| e.path()).collect();
        children.sort();

        for child in children {
            if entries.len() >= MAX_LIST_ENTRIES {
                truncated = true;
                break 'walk;
            }
            if child.is_dir() {
                entries.push(format!("{}/", workspace.display(&child)));
                if recursive && !is_skipped_dir(&child) {
                    pending.push(child);
                }
            } else {
                entries.push(workspace.display(&child));
            }
        }
    }

    let count = entries.len();
    let mut output = if entries.is_empty() {
        "Directory is empty".to_string()
    } else {
        entries.join("\n")
    };
    if truncated {
        output.push_str(&format!("\n... (limited to {} entries)", MAX_LIST_ENTRIES));
    }

    ToolResult::success(LIST_FILES, output)
        .with_duration(start.elapsed().as_millis() as u64)
        .with_match_count(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_read_file_success() {
        let (_dir, ws) = workspace();
        fs::write(ws.root().join("hello.txt"), "Hello, World!\n").unwrap();

        let call = ToolCall::new(READ_FILE).with_arg("path", "hello.txt");
        let result = execute_read_file(&ws, &call);

        assert!(result.is_success());
        assert!(result.output().unwrap().contains("Hello, World!"));
    }

    #[test]
    fn test_read_file_not_found() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(READ_FILE).with_arg("path", "missing.txt");
        let result = execute_read_file(&ws, &call);

        assert_eq!(result.error().unwrap().code, "NOT_FOUND");
    }

    #[test]
    fn test_read_file_outside_workspace() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(READ_FILE).with_arg("path", "../../etc/passwd");
        let result = execute_read_file(&ws, &call);

        assert_eq!(result.error().unwrap().code, "PERMISSION_DENIED");
    }

    #[test]
    fn test_read_file_with_offset_and_limit() {
        let (_dir, ws) = workspace();
        fs::write(ws.root().join("lines.txt"), "line1\nline2\nline3\nline4\nline5\n").unwrap();

        let call = ToolCall::new(READ_FILE)
            .with_arg("path", "lines.txt")
            .with_arg("offset", 1i64)
            .with_arg("limit", 2i64);
        let result = execute_read_file(&ws, &call);

        assert_eq!(result.output(), Some("line2\nline3"));
    }

    #[test]
    fn test_write_file_success() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(WRITE_FILE)
            .with_arg("path", "out.txt")
            .with_arg("content", "Hello, World!");
        let result = execute_write_file(&ws, &call);

        assert!(result.is_success());
        assert_eq!(
            fs::read_to_string(ws.root().join("out.txt")).unwrap(),
            "Hello, World!"
        );
    }

    #[test]
    fn test_write_file_parent_handling() {
        let (_dir, ws) = workspace();
        let call = ToolCall::new(WRITE_FILE)
            .with_arg("path", "sub/dir/file.txt")
            .with_arg("content", "content");
        assert_eq!(
            execute_write_file(&ws, &call).error().unwrap().code,
            "NOT_FOUND"
        );

        let call = call.with_arg("create_dirs", true);
        assert!(execute_write_file(&ws, &call).is_success());
        assert!(ws.root().join("sub/dir/file.txt").exists());
    }

    #[test]
    fn test_list_files() {
        let (_dir, ws) = workspace();
        fs::create_dir_all(ws.root().join("src/nested")).unwrap();
        fs::write(ws.root().join("README.md"), "# readme").unwrap();
        fs::write(ws.root().join("src/lib.rs"), "").unwrap();
        fs::write(ws.root().join("src/nested/mod.rs"), "").unwrap();

        let flat = execute_list_files(&ws, &ToolCall::new(LIST_FILES));
        assert_eq!(flat.output(), Some("README.md\nsrc/"));

        let deep = execute_list_files(
            &ws,
            &ToolCall::new(LIST_FILES)
                .with_arg("path", "src")
                .with_arg("recursive", true),
        );
        let output = deep.output().unwrap();
        assert!(output.contains("src/lib.rs"));
        assert!(output.contains("src/nested/mod.rs"));
        assert_eq!(deep.match_count, Some(3));
    }
}
