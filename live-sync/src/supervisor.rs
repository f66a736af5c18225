//! Lifecycle of one watch pipeline.
//!
//! ```text
//!   Stopped ──start()──► Starting ──► Running ──stop()──► Stopping ──► Stopped
//!      ▲                    │
//!      └──── setup error ───┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use liveindex_directory_watcher::{DirectoryWatcher, WatchScope};
use liveindex_document_index::IndexMutator;

use crate::config::WatcherConfig;
use crate::error::{Result, SyncError};
use crate::observer::SyncObserver;
use crate::orchestrator::{MutationTimeouts, ReindexOrchestrator, ReindexWorker};
use crate::state::SyncState;

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot reported by [`WatcherSupervisor::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub running: bool,
    pub root: PathBuf,
    pub last_sync: Option<DateTime<Utc>>,
}

struct ActivePipeline {
    watcher: DirectoryWatcher,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

/// Owns the watcher, the reindex worker and the shared [`SyncState`].
///
/// `start` and `stop` must be called from inside a tokio runtime.
pub struct WatcherSupervisor {
    scope: WatchScope,
    settings: WatcherConfig,
    mutator: Arc<dyn IndexMutator>,
    observer: Arc<dyn SyncObserver>,
    sync_state: Arc<SyncState>,
    state: SupervisorState,
    active: Option<ActivePipeline>,
}

impl WatcherSupervisor {
    pub fn new(
        scope: WatchScope,
        mutator: Arc<dyn IndexMutator>,
        observer: Arc<dyn SyncObserver>,
        sync_state: Arc<SyncState>,
    ) -> Self {
        Self {
            scope,
            settings: WatcherConfig::default(),
            mutator,
            observer,
            sync_state,
            state: SupervisorState::Stopped,
            active: None,
        }
    }

    /// Set debounce, grace, timeout and queue settings.
    pub fn with_settings(mut self, settings: WatcherConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SupervisorState::Running
    }

    pub fn root(&self) -> &Path {
        &self.scope.root
    }

    pub fn scope(&self) -> &WatchScope {
        &self.scope
    }

    pub fn sync_state(&self) -> &Arc<SyncState> {
        &self.sync_state
    }

    /// Point the supervisor at a new scope. Only allowed while stopped.
    pub fn set_scope(&mut self, scope: WatchScope) -> Result<()> {
        if self.state != SupervisorState::Stopped {
            return Err(SyncError::AlreadyRunning);
        }
        self.scope = scope;
        Ok(())
    }

    pub fn status(&self) -> SupervisorStatus {
        let snapshot = self.sync_state.snapshot();
        SupervisorStatus {
            state: self.state,
            running: self.is_running(),
            root: self.scope.root.clone(),
            last_sync: snapshot.last_sync,
        }
    }

    fn timeouts(&self) -> MutationTimeouts {
        MutationTimeouts {
            delete: self.settings.delete_timeout(),
            ingest: self.settings.ingest_timeout(),
        }
    }

    /// Establish the watch and start the pipeline.
    ///
    /// Fails with [`SyncError::AlreadyRunning`] unless stopped. A setup error
    /// leaves the supervisor stopped.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SupervisorState::Stopped {
            return Err(SyncError::AlreadyRunning);
        }

        self.state = SupervisorState::Starting;
        self.sync_state.reset();

        let timeouts = self.timeouts();
        let (tx, rx) = mpsc::channel(self.settings.task_queue_capacity.max(1));
        let orchestrator =
            ReindexOrchestrator::new(tx, self.observer.clone(), timeouts, self.scope.root.clone());

        let mut watcher = DirectoryWatcher::new(self.scope.clone())
            .with_debounce(self.settings.debounce())
            .with_delete_grace(self.settings.delete_grace());

        if let Err(e) = watcher.start(orchestrator) {
            error!("Failed to watch {}: {e}", self.scope.root.display());
            self.state = SupervisorState::Stopped;
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let worker = ReindexWorker::new(
            rx,
            self.mutator.clone(),
            self.observer.clone(),
            self.sync_state.clone(),
            cancel.clone(),
        )
        .with_timeouts(timeouts);
        let worker = tokio::spawn(worker.run());

        self.active = Some(ActivePipeline {
            watcher,
            cancel,
            worker,
        });
        self.sync_state.set_running(true);
        self.state = SupervisorState::Running;

        info!("Watching {} for changes", self.scope.root.display());
        Ok(())
    }

    /// Stop the pipeline, discarding pending changes.
    ///
    /// The watch thread is told to stop first, so nothing it still buffers
    /// reaches the worker. A mutation already running is allowed to finish;
    /// queued ones are dropped. Both waits share one `stop_timeout`
    /// deadline, after which whatever is left is detached.
    ///
    /// Returns `false` when there was nothing to stop.
    pub async fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        self.state = SupervisorState::Stopping;
        let stop_timeout = self.settings.stop_timeout();
        let deadline = tokio::time::Instant::now() + stop_timeout;

        let mut watcher = active.watcher;
        watcher.request_stop();
        active.cancel.cancel();

        match tokio::time::timeout_at(deadline, active.worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Reindex worker ended abnormally: {e}"),
            Err(_) => warn!("Reindex still running after {stop_timeout:?}, detaching"),
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::task::spawn_blocking(move || watcher.stop(remaining)).await {
            Ok(true) => {}
            Ok(false) => warn!("Watch thread detached after {stop_timeout:?}"),
            Err(e) => warn!("Stopping the watch thread failed: {e}"),
        }

        self.sync_state.set_running(false);
        self.state = SupervisorState::Stopped;

        info!("Stopped watching {}", self.scope.root.display());
        true
    }
}

impl Drop for WatcherSupervisor {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.watcher.request_stop();
            active.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::SyncObserver;
    use async_trait::async_trait;
    use liveindex_directory_watcher::ChangeKind;
    use liveindex_document_index::{IngestOutcome, Result as IndexResult};
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct NoopMutator;

    #[async_trait]
    impl IndexMutator for NoopMutator {
        async fn delete_by_path(&self, _path: &Path, _base_dir: &Path) -> IndexResult<usize> {
            Ok(0)
        }

        async fn ingest(&self, _path: &Path, _base_dir: &Path) -> IndexResult<IngestOutcome> {
            Ok(IngestOutcome { chunks_created: 1 })
        }
    }

    struct SlowMutator(Duration);

    #[async_trait]
    impl IndexMutator for SlowMutator {
        async fn delete_by_path(&self, _path: &Path, _base_dir: &Path) -> IndexResult<usize> {
            Ok(0)
        }

        async fn ingest(&self, _path: &Path, _base_dir: &Path) -> IndexResult<IngestOutcome> {
            tokio::time::sleep(self.0).await;
            Ok(IngestOutcome { chunks_created: 1 })
        }
    }

    struct QuietObserver;

    impl SyncObserver for QuietObserver {
        fn on_file_change(&self, _relative_path: &str, _kind: ChangeKind) {}
        fn on_reindex_complete(&self, _relative_path: &str, _elapsed_ms: f64) {}
    }

    fn supervisor(root: &Path) -> WatcherSupervisor {
        WatcherSupervisor::new(
            WatchScope::new(root),
            Arc::new(NoopMutator),
            Arc::new(QuietObserver),
            Arc::new(SyncState::new()),
        )
        .with_settings(WatcherConfig {
            debounce_ms: 100,
            ..Default::default()
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_stop_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let mut supervisor = supervisor(temp_dir.path());

        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        supervisor.start().unwrap();

        let status = supervisor.status();
        assert!(status.running);
        assert_eq!(status.state, SupervisorState::Running);
        assert_eq!(status.last_sync, None);

        assert!(matches!(supervisor.start(), Err(SyncError::AlreadyRunning)));
        assert!(matches!(
            supervisor.set_scope(WatchScope::new(temp_dir.path())),
            Err(SyncError::AlreadyRunning)
        ));

        assert!(supervisor.stop().await);
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(!supervisor.sync_state().is_running());
        assert!(!supervisor.stop().await);

        supervisor.start().unwrap();
        assert!(supervisor.stop().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_root_stays_stopped() {
        let temp_dir = TempDir::new().unwrap();
        let mut supervisor = supervisor(&temp_dir.path().join("missing"));

        let err = supervisor.start().unwrap_err();
        assert!(matches!(err, SyncError::Setup(_)));
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(!supervisor.status().running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_with_pending_changes_is_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let mut supervisor = supervisor(temp_dir.path()).with_settings(WatcherConfig {
            debounce_ms: 5_000,
            ..Default::default()
        });
        supervisor.start().unwrap();

        std::fs::write(temp_dir.path().join("pending.md"), "x").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        assert!(supervisor.stop().await);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(supervisor.sync_state().last_sync(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_is_bounded_by_one_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let mut supervisor = WatcherSupervisor::new(
            WatchScope::new(temp_dir.path()),
            Arc::new(SlowMutator(Duration::from_secs(10))),
            Arc::new(QuietObserver),
            Arc::new(SyncState::new()),
        )
        .with_settings(WatcherConfig {
            debounce_ms: 100,
            stop_timeout_secs: 1,
            ..Default::default()
        });
        supervisor.start().unwrap();

        std::fs::write(temp_dir.path().join("slow.md"), "x").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let started = Instant::now();
        assert!(supervisor.stop().await);
        assert!(started.elapsed() < Duration::from_millis(1_800));
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(!supervisor.sync_state().is_running());
    }
}
