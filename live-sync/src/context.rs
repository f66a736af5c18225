//! The process-wide live index context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use liveindex_directory_watcher::WatchScope;
use liveindex_document_index::{
    DirectoryIngestReport, DocumentIndex, IndexMutator, IndexedDocument, SearchHit,
};

use crate::broadcast::{BroadcastHub, spawn_dispatcher};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::events::StatusPayload;
use crate::observer::BroadcastObserver;
use crate::state::SyncState;
use crate::supervisor::WatcherSupervisor;

/// Outcome of a watcher start or stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WatcherControl {
    Started { directory: PathBuf },
    AlreadyRunning { directory: PathBuf },
    Stopped,
    NotRunning,
    Error { message: String },
}

/// Watcher state for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherStatus {
    pub running: bool,

    /// Watched directory, only while running.
    pub directory: Option<PathBuf>,

    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Connected,
    Disconnected,
}

/// Liveness of the index backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub store: StoreState,
    pub timestamp: DateTime<Utc>,
}

/// Every indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentListing {
    pub documents: Vec<IndexedDocument>,
    pub count: usize,
}

/// Index, broadcast hub and watcher supervisor for one process.
///
/// Built once at start-up and passed by reference to whatever serves
/// requests. Construction spawns the broadcast dispatcher, so it must happen
/// inside a tokio runtime.
pub struct LiveIndexContext {
    config: SyncConfig,
    index: Arc<DocumentIndex>,
    hub: Arc<BroadcastHub>,
    sync_state: Arc<SyncState>,
    supervisor: Mutex<WatcherSupervisor>,
}

impl LiveIndexContext {
    /// Build the context and its index from configuration.
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        let index = Arc::new(DocumentIndex::from_config(&config.index)?);
        Ok(Self::new(config, index))
    }

    /// Build the context around an existing index.
    pub fn new(config: SyncConfig, index: Arc<DocumentIndex>) -> Self {
        let mutator: Arc<dyn IndexMutator> = index.clone();
        Self::with_mutator(config, index, mutator)
    }

    /// Build the context with a separate mutation backend.
    ///
    /// The live pipeline writes through `mutator`; status, search and
    /// resync use `index`.
    pub fn with_mutator(
        config: SyncConfig,
        index: Arc<DocumentIndex>,
        mutator: Arc<dyn IndexMutator>,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::new().with_send_timeout(config.broadcast.send_timeout()));
        let (publisher, _dispatcher) =
            spawn_dispatcher(hub.clone(), config.broadcast.queue_capacity);
        let sync_state = Arc::new(SyncState::new());

        let supervisor = WatcherSupervisor::new(
            config.watch_scope(),
            mutator,
            Arc::new(BroadcastObserver::new(publisher)),
            sync_state.clone(),
        )
        .with_settings(config.watcher.clone());

        Self {
            config,
            index,
            hub,
            sync_state,
            supervisor: Mutex::new(supervisor),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn sync_state(&self) -> &Arc<SyncState> {
        &self.sync_state
    }

    fn scope_for(&self, directory: &Path) -> WatchScope {
        WatchScope::new(directory).with_extensions(&self.config.watcher.extensions)
    }

    /// Start watching the configured documents path if it exists.
    pub async fn bootstrap(&self) {
        if !self.config.auto_start {
            return;
        }

        let path = &self.config.documents_path;
        if !path.exists() {
            warn!("Documents path not found: {}", path.display());
            return;
        }

        match self.start_watcher(None).await {
            WatcherControl::Started { directory } => {
                info!("File watcher started for {}", directory.display());
            }
            WatcherControl::Error { message } => warn!("File watcher not started: {message}"),
            _ => {}
        }
    }

    /// Start watching `directory`, or the configured documents path.
    pub async fn start_watcher(&self, directory: Option<PathBuf>) -> WatcherControl {
        let directory = directory.unwrap_or_else(|| self.config.documents_path.clone());
        let directory = std::path::absolute(&directory).unwrap_or(directory);

        if !directory.exists() {
            return WatcherControl::Error {
                message: format!("Directory not found: {}", directory.display()),
            };
        }

        let mut supervisor = self.supervisor.lock().await;
        if supervisor.is_running() {
            return WatcherControl::AlreadyRunning {
                directory: supervisor.root().to_path_buf(),
            };
        }

        let started = supervisor
            .set_scope(self.scope_for(&directory))
            .and_then(|()| supervisor.start());

        match started {
            Ok(()) => WatcherControl::Started { directory },
            Err(e) => WatcherControl::Error {
                message: e.to_string(),
            },
        }
    }

    pub async fn stop_watcher(&self) -> WatcherControl {
        if self.supervisor.lock().await.stop().await {
            WatcherControl::Stopped
        } else {
            WatcherControl::NotRunning
        }
    }

    pub async fn watcher_status(&self) -> WatcherStatus {
        let status = self.supervisor.lock().await.status();
        WatcherStatus {
            running: status.running,
            directory: status.running.then_some(status.root),
            last_sync: status.last_sync,
        }
    }

    /// Index contents plus watcher state.
    pub async fn status(&self) -> Result<StatusPayload> {
        let index_status = self.index.status().await?;
        let sync = self.sync_state.snapshot();

        Ok(StatusPayload {
            documents_indexed: index_status.documents_indexed,
            documents: index_status.documents,
            watcher_active: sync.running,
            last_sync: sync.last_sync,
        })
    }

    pub async fn health(&self) -> HealthStatus {
        let reachable = self.index.is_healthy().await;
        HealthStatus {
            status: if reachable {
                HealthState::Ok
            } else {
                HealthState::Degraded
            },
            store: if reachable {
                StoreState::Connected
            } else {
                StoreState::Disconnected
            },
            timestamp: Utc::now(),
        }
    }

    /// Ingest every document under `directory` (default: the documents
    /// path). Recovers anything the live pipeline missed.
    pub async fn resync(&self, directory: Option<&Path>) -> Result<DirectoryIngestReport> {
        let directory = directory.unwrap_or(&self.config.documents_path);
        Ok(self.index.ingest_directory(&self.scope_for(directory)).await?)
    }

    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        Ok(self.index.search(query, top_k).await?)
    }

    pub async fn documents(&self) -> Result<DocumentListing> {
        let documents = self.index.status().await?.documents;
        Ok(DocumentListing {
            count: documents.len(),
            documents,
        })
    }

    /// Stop the watcher. Subscribers stay registered until dropped.
    pub async fn shutdown(&self) {
        if self.supervisor.lock().await.stop().await {
            info!("File watcher stopped");
        }
    }
}
