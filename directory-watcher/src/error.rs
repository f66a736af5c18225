//! Error types for the directory watcher.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatchSetupError>;

/// Errors raised while establishing a watch.
///
/// All of these are fatal to the start attempt that produced them. Nothing
/// here is retried automatically.
#[derive(Error, Debug)]
pub enum WatchSetupError {
    /// The watch root does not exist.
    #[error("directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The watch root exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The watch root cannot be read.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The watcher is already running.
    #[error("watcher already running for: {}", .0.display())]
    AlreadyWatching(PathBuf),

    /// OS watch registration failed.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
