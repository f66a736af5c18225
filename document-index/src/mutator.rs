//! The mutation contract the live pipeline drives.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of ingesting one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub chunks_created: usize,
}

/// Index mutations keyed by document path.
///
/// Both operations must be idempotent: the pipeline may repeat one after a
/// timeout whose first attempt actually went through.
#[async_trait]
pub trait IndexMutator: Send + Sync {
    /// Remove everything indexed for `path`. Returns the number of chunks
    /// removed.
    async fn delete_by_path(&self, path: &Path, base_dir: &Path) -> Result<usize>;

    /// (Re)index `path` from its current contents.
    async fn ingest(&self, path: &Path, base_dir: &Path) -> Result<IngestOutcome>;
}
