//! Document ingestion, deletion, status and search over a vector store.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use liveindex_directory_watcher::{DocumentScanner, WatchScope, relative_path};
use liveindex_embeddings::EmbeddingProvider;

use crate::chunker::{ChunkingConfig, TextSplitter};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::mutator::{IndexMutator, IngestOutcome};
use crate::store::{ChunkPayload, ChunkPoint, IndexedDocument, InMemoryVectorStore, VectorStore};

/// Report for a single ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Relative path of the document.
    pub file: String,
    pub chunks_created: usize,
    pub time_seconds: f64,
}

/// Report for a full directory ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryIngestReport {
    pub status: String,
    pub documents_ingested: usize,
    pub chunks_created: usize,
    pub time_seconds: f64,
}

/// Index contents summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Total stored chunks.
    pub documents_indexed: usize,

    /// Unique documents.
    pub documents: Vec<IndexedDocument>,
}

/// A search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file: String,
    pub chunk: String,
    pub score: f32,
    pub updated_at: DateTime<Utc>,
}

/// The derived search index over a documents directory.
///
/// Every mutation is keyed by the document's path relative to the base
/// directory, so a document can always be replaced or removed wholesale.
pub struct DocumentIndex {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    splitter: TextSplitter,
    search_limit: usize,
}

impl DocumentIndex {
    /// Create an index over the given provider and store.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Result<Self> {
        Ok(Self {
            provider,
            store,
            splitter: TextSplitter::new(&ChunkingConfig::default())?,
            search_limit: IndexConfig::default().search_limit,
        })
    }

    /// Build an index with an in-memory store from configuration.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let provider = config.embedding.build_provider();
        let store = Arc::new(InMemoryVectorStore::new(provider.default_dimension()));

        Ok(Self::new(provider, store)?
            .with_chunking(&config.chunking)?
            .with_search_limit(config.search_limit))
    }

    /// Set the chunking parameters.
    pub fn with_chunking(mut self, chunking: &ChunkingConfig) -> Result<Self> {
        self.splitter = TextSplitter::new(chunking)?;
        Ok(self)
    }

    /// Set the default number of search results.
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Replace the indexed contents of one document.
    pub async fn ingest_file(&self, path: &Path, base_dir: &Path) -> Result<IngestReport> {
        let started = Instant::now();
        let file = relative_path(base_dir, path);

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| read_error(path, e))?;
        let updated_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| read_error(path, e))?;

        self.store.delete_by_file(&file).await?;

        let chunks = self.splitter.split_text(&text);
        if chunks.is_empty() {
            debug!("{file} has no content, nothing to index");
            return Ok(IngestReport {
                file,
                chunks_created: 0,
                time_seconds: started.elapsed().as_secs_f64(),
            });
        }

        let vectors = self.provider.embed_texts(&chunks).await?;
        let ingested_at = Utc::now();

        let points: Vec<ChunkPoint> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (chunk_text, vector))| {
                ChunkPoint::new(
                    vector,
                    ChunkPayload {
                        file_path: file.clone(),
                        chunk_index,
                        chunk_text,
                        updated_at,
                        ingested_at,
                    },
                )
            })
            .collect();

        let chunks_created = points.len();
        self.store.upsert(points).await?;

        let time_seconds = started.elapsed().as_secs_f64();
        info!("Ingested {file}: {chunks_created} chunks in {time_seconds:.2}s");

        Ok(IngestReport {
            file,
            chunks_created,
            time_seconds,
        })
    }

    /// Remove every chunk of one document.
    pub async fn delete_file(&self, path: &Path, base_dir: &Path) -> Result<usize> {
        let file = relative_path(base_dir, path);
        let removed = self.store.delete_by_file(&file).await?;
        debug!("Removed {removed} chunks for {file}");
        Ok(removed)
    }

    /// Ingest every supported document in a scope.
    ///
    /// Documents that fail are logged and skipped. This is the recovery path
    /// for anything the live pipeline missed.
    pub async fn ingest_directory(&self, scope: &WatchScope) -> Result<DirectoryIngestReport> {
        let started = Instant::now();
        let files = DocumentScanner::new(scope.clone()).scan()?;

        let mut documents_ingested = 0;
        let mut chunks_created = 0;

        for scanned in &files {
            match self.ingest_file(&scanned.path, &scope.root).await {
                Ok(report) => {
                    documents_ingested += 1;
                    chunks_created += report.chunks_created;
                }
                Err(e) => warn!("Failed to ingest {}: {e}", scanned.relative_path),
            }
        }

        let time_seconds = started.elapsed().as_secs_f64();
        info!(
            "Ingested {documents_ingested}/{} documents ({chunks_created} chunks) from {} in {time_seconds:.2}s",
            files.len(),
            scope.root.display()
        );

        Ok(DirectoryIngestReport {
            status: "success".to_string(),
            documents_ingested,
            chunks_created,
            time_seconds,
        })
    }

    /// Summarize the index contents.
    pub async fn status(&self) -> Result<IndexStatus> {
        Ok(IndexStatus {
            documents_indexed: self.store.count().await?,
            documents: self.store.documents().await?,
        })
    }

    /// Find the chunks closest to `query`.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        let limit = top_k.unwrap_or(self.search_limit);
        let mut vectors = self.provider.embed_texts(&[query.to_string()]).await?;
        let Some(vector) = vectors.pop() else {
            return Ok(Vec::new());
        };

        let hits = self.store.search(&vector, limit).await?;
        Ok(hits
            .into_iter()
            .map(|hit| SearchHit {
                file: hit.payload.file_path,
                chunk: hit.payload.chunk_text,
                score: hit.score,
                updated_at: hit.payload.updated_at,
            })
            .collect())
    }

    /// Whether the backing store answers.
    pub async fn is_healthy(&self) -> bool {
        self.store.is_reachable().await
    }
}

#[async_trait]
impl IndexMutator for DocumentIndex {
    async fn delete_by_path(&self, path: &Path, base_dir: &Path) -> Result<usize> {
        self.delete_file(path, base_dir).await
    }

    async fn ingest(&self, path: &Path, base_dir: &Path) -> Result<IngestOutcome> {
        let report = self.ingest_file(path, base_dir).await?;
        Ok(IngestOutcome {
            chunks_created: report.chunks_created,
        })
    }
}

/// A file that vanished while being read is `NotFound`, not an IO failure.
fn read_error(path: &Path, e: std::io::Error) -> IndexError {
    if e.kind() == std::io::ErrorKind::NotFound {
        IndexError::NotFound(path.to_path_buf())
    } else {
        e.into()
    }
}
