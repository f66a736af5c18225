//! Watch scope configuration.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchSetupError};

/// Extensions watched when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "txt", "markdown"];

/// The directory tree a single watcher instance observes.
///
/// Immutable once handed to a running watcher. Extensions are stored
/// lower-case without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchScope {
    /// Root directory of the watch.
    pub root: PathBuf,

    /// Whether subdirectories are watched.
    pub recursive: bool,

    /// File extensions that pass the filter.
    pub allowed_extensions: Vec<String>,
}

impl WatchScope {
    /// Create a recursive scope with the default extension allow-list.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);

        Self {
            root,
            recursive: true,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Replace the extension allow-list.
    ///
    /// Accepts entries with or without a leading dot, in any case.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Only watch the root itself, not its subdirectories.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Check whether a path's extension is in the allow-list.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(std::ffi::OsStr::to_str) else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }

    /// Path of `path` relative to the root, `/`-separated.
    pub fn relative_path(&self, path: &Path) -> String {
        relative_path(&self.root, path)
    }

    /// Make sure the root is usable for watching.
    pub fn validate(&self) -> Result<()> {
        let metadata = std::fs::metadata(&self.root).map_err(|e| self.setup_error(e))?;
        if !metadata.is_dir() {
            return Err(WatchSetupError::NotADirectory(self.root.clone()));
        }

        std::fs::read_dir(&self.root).map_err(|e| self.setup_error(e))?;
        Ok(())
    }

    fn setup_error(&self, e: std::io::Error) -> WatchSetupError {
        match e.kind() {
            ErrorKind::NotFound => WatchSetupError::RootNotFound(self.root.clone()),
            ErrorKind::PermissionDenied => WatchSetupError::PermissionDenied(self.root.clone()),
            _ => e.into(),
        }
    }
}

/// Lower-case an extension and strip a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Compute `path` relative to `root` with `/` separators.
///
/// Falls back to the canonical root (OS watchers may report resolved paths)
/// and finally to the path as given.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let stripped = path.strip_prefix(root).ok().map(Path::to_path_buf).or_else(|| {
        let canonical = root.canonicalize().ok()?;
        path.strip_prefix(canonical).ok().map(Path::to_path_buf)
    });

    match stripped {
        Some(rel) => join_components(&rel),
        None => path.display().to_string(),
    }
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
