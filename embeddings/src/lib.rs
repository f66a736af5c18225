//! # Embeddings
//!
//! Embedding generation and similarity math for the live document index.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text chunks to dense vectors
//! - **Multiple Providers**: OpenAI over HTTP, or offline feature hashing
//! - **Similarity Search**: Cosine top-k over stored vectors
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► find_top_k                 │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  OpenAI / Hashing                                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OpenAIProvider,
};
pub use similarity::{SimilarityResult, cosine_similarity, find_top_k, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
