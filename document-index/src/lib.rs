//! # Document Index
//!
//! The derived search index kept in sync with a documents directory:
//!
//! - **Chunking**: Recursive character splitting with overlap
//! - **Embeddings**: One batch call per document
//! - **Vector Store**: Create, search and delete-by-file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Document Index                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │ TextSplitter │  │  Embedding   │  │ VectorStore  │          │
//! │  │              │  │  Provider    │  │              │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │ DocumentIndex│ ◄── IndexMutator              │
//! │                  └──────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use liveindex_document_index::{DocumentIndex, IndexConfig};
//!
//! let index = DocumentIndex::from_config(&IndexConfig::default())?;
//! index.ingest_file(&path, &documents_root).await?;
//! let hits = index.search("vacation policy", None).await?;
//! ```

pub mod chunker;
pub mod config;
pub mod error;
pub mod index;
pub mod mutator;
pub mod store;

pub use chunker::{ChunkingConfig, TextSplitter};
pub use config::{EmbeddingConfig, EmbeddingProviderType, IndexConfig};
pub use error::{IndexError, Result};
pub use index::{DirectoryIngestReport, DocumentIndex, IndexStatus, IngestReport, SearchHit};
pub use mutator::{IndexMutator, IngestOutcome};
pub use store::{
    ChunkPayload, ChunkPoint, InMemoryVectorStore, IndexedDocument, ScoredChunk, VectorStore,
};
