//! Configuration for the document index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use liveindex_embeddings::{EmbeddingProvider, HashingProvider, OpenAIProvider};

use crate::chunker::ChunkingConfig;

/// Configuration for the document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// How documents are split.
    pub chunking: ChunkingConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Default number of search results.
    pub search_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            search_limit: 5,
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: Option<String>,

    /// API key; falls back to `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Override for the API base URL.
    pub base_url: Option<String>,

    /// Output dimension for the hashing provider.
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAI,
            model: None,
            api_key: None,
            base_url: None,
            dimension: None,
        }
    }
}

impl EmbeddingConfig {
    /// Build the configured provider.
    pub fn build_provider(&self) -> Arc<dyn EmbeddingProvider> {
        match self.provider {
            EmbeddingProviderType::OpenAI => {
                let mut provider = OpenAIProvider::new();
                if let Some(key) = &self.api_key {
                    provider = provider.with_api_key(key);
                }
                if let Some(model) = &self.model {
                    provider = provider.with_model(model);
                }
                if let Some(url) = &self.base_url {
                    provider = provider.with_base_url(url);
                }
                Arc::new(provider)
            }
            EmbeddingProviderType::Hashing => Arc::new(HashingProvider::new(
                self.dimension.unwrap_or(HashingProvider::DEFAULT_DIMENSION),
            )),
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Offline feature hashing.
    Hashing,
}
