//! Error types for live synchronization.

use thiserror::Error;

use crate::connectors::ConnectorError;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the live sync layer.
///
/// Reindex failures are not here: they are logged by the pipeline and never
/// propagate to callers.
#[derive(Error, Debug)]
pub enum SyncError {
    /// `start` was called while the supervisor was not stopped.
    #[error("watcher already running")]
    AlreadyRunning,

    /// The watch could not be established.
    #[error("watch setup failed: {0}")]
    Setup(#[from] liveindex_directory_watcher::WatchSetupError),

    /// Index error.
    #[error("index error: {0}")]
    Index(#[from] liveindex_document_index::IndexError),

    /// Connector error.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// A subscriber could not be reached.
    #[error("subscriber delivery failed: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
