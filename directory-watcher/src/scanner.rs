//! One-shot scans of a watch scope.
//!
//! Used for full resyncs and for listing documents; the live path never
//! walks the tree.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::WatchScope;
use crate::error::Result;

/// A file found by a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedFile {
    /// Full path to the file.
    pub path: PathBuf,

    /// Path relative to the scope root.
    pub relative_path: String,

    /// File size in bytes.
    pub size: u64,

    /// Lower-case extension.
    pub extension: String,

    /// MIME type inferred from the extension.
    pub mime_type: String,

    pub created: Option<DateTime<Utc>>,

    pub modified: Option<DateTime<Utc>>,
}

/// Walks a scope and returns the files that pass its extension filter.
pub struct DocumentScanner {
    scope: WatchScope,
}

impl DocumentScanner {
    pub fn new(scope: WatchScope) -> Self {
        Self { scope }
    }

    /// Scan the scope, sorted by relative path.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        self.scope.validate()?;

        let max_depth = if self.scope.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.scope.root).max_depth(max_depth) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.scope.matches(entry.path()) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping {}: {e}", entry.path().display());
                    continue;
                }
            };

            let extension = entry
                .path()
                .extension()
                .and_then(std::ffi::OsStr::to_str)
                .map(str::to_lowercase)
                .unwrap_or_default();

            files.push(ScannedFile {
                relative_path: self.scope.relative_path(entry.path()),
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                mime_type: mime_from_extension(&extension).to_string(),
                extension,
                created: metadata.created().ok().map(DateTime::<Utc>::from),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        debug!(
            "Scanned {} documents under {}",
            files.len(),
            self.scope.root.display()
        );
        Ok(files)
    }
}

/// Get MIME type from file extension.
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "rst" => "text/x-rst",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_and_recurses() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("team")).unwrap();
        fs::write(temp_dir.path().join("a.md"), "# A").unwrap();
        fs::write(temp_dir.path().join("team/b.txt"), "b").unwrap();
        fs::write(temp_dir.path().join("code.rs"), "fn main() {}").unwrap();

        let files = DocumentScanner::new(WatchScope::new(temp_dir.path()))
            .scan()
            .unwrap();

        let names: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(names, vec!["a.md", "team/b.txt"]);
        assert_eq!(files[0].mime_type, "text/markdown");
        assert_eq!(files[0].size, 3);
    }

    #[test]
    fn test_non_recursive_scan() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("top.md"), "x").unwrap();
        fs::write(temp_dir.path().join("nested/deep.md"), "x").unwrap();

        let files = DocumentScanner::new(WatchScope::new(temp_dir.path()).non_recursive())
            .scan()
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "top.md");
    }
}
