//! Vector storage for document chunks.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use liveindex_embeddings::{Embedding, EmbeddingError, find_top_k, normalize};

use crate::error::{IndexError, Result};

/// Payload stored alongside every chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Document path relative to the documents root.
    pub file_path: String,

    /// Position of the chunk within the document.
    pub chunk_index: usize,

    /// The chunk text.
    pub chunk_text: String,

    /// Modification time of the source file.
    pub updated_at: DateTime<Utc>,

    /// When this chunk was written.
    pub ingested_at: DateTime<Utc>,
}

/// A stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Embedding,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    /// Create a point with a fresh random id.
    pub fn new(vector: Embedding, payload: ChunkPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            payload,
        }
    }
}

/// A chunk matched by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// A document as seen through the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Relative path of the document.
    pub file: String,

    /// Number of chunks stored for it.
    pub chunks: usize,

    /// Source modification time recorded at ingest.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Storage engine contract: create, search and delete-by-file.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace points by id.
    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<()>;

    /// Remove every chunk of a document. Returns how many were removed.
    async fn delete_by_file(&self, file_path: &str) -> Result<usize>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize>;

    /// Unique documents, sorted by path.
    async fn documents(&self) -> Result<Vec<IndexedDocument>>;

    /// Nearest chunks to `query`, best first.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Whether the backend is reachable.
    async fn is_reachable(&self) -> bool;
}

/// Process-local vector store.
///
/// Vectors are normalized on insert so search is a plain cosine scan.
pub struct InMemoryVectorStore {
    points: RwLock<HashMap<Uuid, ChunkPoint>>,
    dimension: usize,
}

impl InMemoryVectorStore {
    /// Create a store accepting vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            points: RwLock::new(HashMap::new()),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<()> {
        for point in &points {
            self.check_dimension(point.vector.len())?;
        }

        let mut stored = self.points.write().await;
        let count = points.len();
        for mut point in points {
            normalize(&mut point.vector);
            stored.insert(point.id, point);
        }

        debug!("Upserted {count} points");
        Ok(())
    }

    async fn delete_by_file(&self, file_path: &str) -> Result<usize> {
        let mut stored = self.points.write().await;
        let before = stored.len();
        stored.retain(|_, p| p.payload.file_path != file_path);
        let removed = before - stored.len();

        if removed > 0 {
            debug!("Deleted {removed} points for {file_path}");
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.points.read().await.len())
    }

    async fn documents(&self) -> Result<Vec<IndexedDocument>> {
        let stored = self.points.read().await;
        let mut by_file: BTreeMap<&str, IndexedDocument> = BTreeMap::new();

        for point in stored.values() {
            let doc = by_file
                .entry(point.payload.file_path.as_str())
                .or_insert_with(|| IndexedDocument {
                    file: point.payload.file_path.clone(),
                    chunks: 0,
                    updated_at: None,
                });
            doc.chunks += 1;
            doc.updated_at = doc.updated_at.max(Some(point.payload.updated_at));
        }

        Ok(by_file.into_values().collect())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        self.check_dimension(query.len())?;

        let stored = self.points.read().await;
        let candidates = stored.values().map(|p| (p.id, p.vector.as_slice()));
        let top = find_top_k(query, candidates, limit, f32::MIN)?;

        top.into_iter()
            .map(|hit| {
                stored
                    .get(&hit.id)
                    .map(|p| ScoredChunk {
                        score: hit.score,
                        payload: p.payload.clone(),
                    })
                    .ok_or_else(|| IndexError::Store(format!("point {} vanished", hit.id)))
            })
            .collect()
    }

    async fn is_reachable(&self) -> bool {
        true
    }
}
