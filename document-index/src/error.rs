//! Error types for the document index.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while mutating or querying the index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] liveindex_embeddings::EmbeddingError),

    /// Directory scan error.
    #[error("scan error: {0}")]
    Scan(#[from] liveindex_directory_watcher::WatchSetupError),

    /// The document does not exist.
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Vector store error.
    #[error("vector store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
