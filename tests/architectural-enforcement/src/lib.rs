//! Architectural Enforcement
//!
//! Source scanning helpers shared by the integration tests in `tests/`:
//! - No blocking I/O inside async production code
//! - No detached `tokio::spawn` outside the background task tracker
//!
//! The scans are line based. They skip comments, the trailing
//! `#[cfg(test)] mod tests` block of each file, and test-only modules.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["router/core/src", "router/cli/src"];

/// Files that only exist for tests
const TEST_ONLY_FILES: &[&str] = &["test_utils.rs"];

/// Workspace root, resolved from this crate's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// One production source file, loaded for scanning
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    lines: Vec<String>,
}

impl SourceFile {
    /// Lines outside the test module as `(line_number, code_without_comment)`
    pub fn production_lines(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let end = self.test_module_start().unwrap_or(self.lines.len());
        self.lines[..end].iter().enumerate().filter_map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            if code.trim().is_empty() {
                None
            } else {
                Some((idx + 1, code))
            }
        })
    }

    /// Full text of a 1-based line
    pub fn line(&self, line_number: usize) -> &str {
        self.lines.get(line_number - 1).map_or("", |l| l.trim())
    }

    /// Whether the 1-based line sits inside an `async fn` body
    pub fn is_in_async_function(&self, line_number: usize) -> bool {
        for line in self.lines[..line_number].iter().rev() {
            let line = line.trim();
            if line.contains("async fn ") {
                return true;
            }
            if line.contains("fn ") && !line.starts_with("//") {
                return false;
            }
            if line.starts_with("mod ") || (line.starts_with("impl") && line.ends_with('{')) {
                return false;
            }
        }
        false
    }

    /// Format a violation for the report
    pub fn violation(&self, line_number: usize, what: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            line_number,
            what,
            self.line(line_number)
        )
    }

    fn test_module_start(&self) -> Option<usize> {
        self.lines.windows(2).position(|pair| {
            pair[0].trim() == "#[cfg(test)]" && pair[1].trim_start().starts_with("mod tests")
        })
    }
}

/// Load every production `.rs` file under [`PRODUCTION_DIRS`]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let base = root.join(dir);
        if !base.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&base).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
            if TEST_ONLY_FILES.contains(&name) {
                continue;
            }
            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };
            files.push(SourceFile {
                path: path.strip_prefix(&root).unwrap_or(path).to_path_buf(),
                lines: content.lines().map(str::to_string).collect(),
            });
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from("x.rs"),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let file = source("fn a() {}\n// comment only\n#[cfg(test)]\nmod tests {\n    fn b() {}\n}\n");
        let lines: Vec<usize> = file.production_lines().map(|(n, _)| n).collect();
        assert_eq!(lines, vec![1]);
    }

    #[test]
    fn test_async_detection() {
        let file = source("async fn a() {\n    x();\n}\nfn b() {\n    y();\n}\n");
        assert!(file.is_in_async_function(2));
        assert!(!file.is_in_async_function(5));
    }

    #[test]
    fn test_sources_are_found() {
        assert!(!production_sources().is_empty());
    }
}
