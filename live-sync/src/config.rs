//! Configuration for live synchronization.
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional TOML file, and environment variables. A `.env` file in the
//! working directory is loaded first.
//!
//! ```toml
//! documents_path = "./documents"
//!
//! [watcher]
//! debounce_ms = 500
//! extensions = ["md", "txt", "markdown"]
//!
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! liveindex_live_sync = "debug"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use liveindex_directory_watcher::{DEFAULT_EXTENSIONS, WatchScope};
use liveindex_document_index::{EmbeddingProviderType, IndexConfig};

use crate::error::{Result, SyncError};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the watched documents tree.
    pub documents_path: PathBuf,

    /// Start watching on bootstrap when the documents path exists.
    pub auto_start: bool,

    pub watcher: WatcherConfig,

    pub broadcast: BroadcastConfig,

    pub index: IndexConfig,

    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            documents_path: PathBuf::from("./documents"),
            auto_start: true,
            watcher: WatcherConfig::default(),
            broadcast: BroadcastConfig::default(),
            index: IndexConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Debounce and handoff timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Settle window for bursts of events.
    pub debounce_ms: u64,

    /// How long a deleted file gets to reappear before the delete is final.
    pub delete_grace_ms: u64,

    /// Extension allow-list.
    pub extensions: Vec<String>,

    /// Bound on a delete-only mutation.
    pub delete_timeout_secs: u64,

    /// Bound on a delete-then-reingest mutation.
    pub ingest_timeout_secs: u64,

    /// Bound on joining the watch thread during stop.
    pub stop_timeout_secs: u64,

    /// Reindex tasks that may queue before the watch thread blocks.
    pub task_queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            delete_grace_ms: 100,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            delete_timeout_secs: 30,
            ingest_timeout_secs: 60,
            stop_timeout_secs: 5,
            task_queue_capacity: 64,
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn delete_grace(&self) -> Duration {
        Duration::from_millis(self.delete_grace_ms)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Subscriber fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Per-subscriber send bound.
    pub send_timeout_ms: u64,

    /// Events that may queue for the dispatcher before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 2000,
            queue_capacity: 256,
        }
    }
}

impl BroadcastConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Log filter settings. `RUST_LOG` overrides all of this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level.
    pub default: String,

    /// Per-target overrides.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: "info".to_string(),
            modules: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.documents_path = std::path::absolute(&config.documents_path)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DOCUMENTS_PATH") {
            self.documents_path = PathBuf::from(path);
        }

        if let Some(value) = lookup("LIVEINDEX_DEBOUNCE_MS") {
            self.watcher.debounce_ms = value.trim().parse().map_err(|_| {
                SyncError::Config(format!("LIVEINDEX_DEBOUNCE_MS is not a number: {value}"))
            })?;
        }

        if let Some(value) = lookup("LIVEINDEX_EXTENSIONS") {
            self.watcher.extensions = value
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(value) = lookup("LIVEINDEX_EMBEDDING_PROVIDER") {
            self.index.embedding.provider = match value.trim().to_lowercase().as_str() {
                "openai" => EmbeddingProviderType::OpenAI,
                "hashing" => EmbeddingProviderType::Hashing,
                other => {
                    return Err(SyncError::Config(format!(
                        "unknown embedding provider: {other}"
                    )));
                }
            };
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.index.embedding.api_key = Some(key);
        }

        if let Some(level) = lookup("LIVEINDEX_LOG") {
            self.logging.default = level;
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.watcher.debounce_ms == 0 {
            return Err(SyncError::Config("debounce_ms must be positive".to_string()));
        }
        if self.watcher.extensions.is_empty() {
            return Err(SyncError::Config("at least one extension is required".to_string()));
        }
        if self.watcher.task_queue_capacity == 0 || self.broadcast.queue_capacity == 0 {
            return Err(SyncError::Config("queue capacities must be positive".to_string()));
        }
        if self.watcher.delete_timeout_secs == 0 || self.watcher.ingest_timeout_secs == 0 {
            return Err(SyncError::Config("mutation timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// The watch scope described by this configuration.
    pub fn watch_scope(&self) -> WatchScope {
        WatchScope::new(&self.documents_path).with_extensions(&self.watcher.extensions)
    }
}
