//! Cross-thread handoff from the watch thread to the reindex worker.
//!
//! ```text
//!   watch thread                          tokio runtime
//!  ┌──────────────────────┐  ReindexTask  ┌──────────────────┐
//!  │ ReindexOrchestrator  │ ────────────► │  ReindexWorker   │ ──► IndexMutator
//!  │ (ChangeSink)         │ ◄──────────── │  (one task)      │
//!  └──────────────────────┘  TaskOutcome  └──────────────────┘
//! ```
//!
//! The orchestrator blocks the watch thread until the worker replies or the
//! mutation bound (plus [`HANDOFF_SLACK`]) runs out. The worker runs one
//! task at a time, so mutations never overlap.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use liveindex_directory_watcher::{ChangeKind, ChangeSink, FileChange};
use liveindex_document_index::{IndexError, IndexMutator};

use crate::observer::SyncObserver;
use crate::state::SyncState;

/// Extra time the watch thread waits beyond the worker's own bound.
pub const HANDOFF_SLACK: Duration = Duration::from_secs(1);

/// Bounds on a single mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationTimeouts {
    /// Delete-only mutation.
    pub delete: Duration,

    /// Delete-then-reingest mutation.
    pub ingest: Duration,
}

impl MutationTimeouts {
    pub fn bound_for(&self, kind: ChangeKind) -> Duration {
        match kind {
            ChangeKind::Deleted => self.delete,
            ChangeKind::Created | ChangeKind::Modified => self.ingest,
        }
    }
}

impl Default for MutationTimeouts {
    fn default() -> Self {
        Self {
            delete: Duration::from_secs(30),
            ingest: Duration::from_secs(60),
        }
    }
}

/// How a handed-off task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The mutation succeeded.
    Completed { elapsed_ms: f64 },

    /// The file vanished before it could be ingested.
    Skipped,

    /// The mutation returned an error.
    Failed(String),

    /// The mutation exceeded its bound.
    TimedOut,

    /// The worker shut down before the task started.
    Cancelled,
}

/// One unit of work crossing from the watch thread to the worker.
#[derive(Debug)]
pub struct ReindexTask {
    pub path: PathBuf,
    pub relative_path: String,
    pub kind: ChangeKind,
    pub base_dir: PathBuf,
    reply: std_mpsc::SyncSender<TaskOutcome>,
}

impl ReindexTask {
    /// Create a task and the receiver its outcome arrives on.
    pub fn new(change: FileChange, base_dir: PathBuf) -> (Self, std_mpsc::Receiver<TaskOutcome>) {
        let (reply, outcome) = std_mpsc::sync_channel(1);
        let task = Self {
            path: change.path,
            relative_path: change.relative_path,
            kind: change.kind,
            base_dir,
            reply,
        };
        (task, outcome)
    }

    fn finish(self, outcome: TaskOutcome) {
        // The orchestrator may have given up waiting.
        let _ = self.reply.try_send(outcome);
    }
}

/// Watch-thread side of the handoff.
pub struct ReindexOrchestrator {
    tasks: mpsc::Sender<ReindexTask>,
    observer: Arc<dyn SyncObserver>,
    timeouts: MutationTimeouts,
    base_dir: PathBuf,
}

impl ReindexOrchestrator {
    pub fn new(
        tasks: mpsc::Sender<ReindexTask>,
        observer: Arc<dyn SyncObserver>,
        timeouts: MutationTimeouts,
        base_dir: PathBuf,
    ) -> Self {
        Self {
            tasks,
            observer,
            timeouts,
            base_dir,
        }
    }

    /// Hand one change to the worker and wait for the outcome.
    ///
    /// Must not be called from inside the tokio runtime.
    pub fn dispatch(&self, change: FileChange) -> Option<TaskOutcome> {
        self.observer.on_file_change(&change.relative_path, change.kind);

        if change.kind != ChangeKind::Deleted && !change.path.exists() {
            info!("{} no longer exists, skipping", change.relative_path);
            return None;
        }

        let wait = self.timeouts.bound_for(change.kind) + HANDOFF_SLACK;
        let relative_path = change.relative_path.clone();
        let (task, outcome) = ReindexTask::new(change, self.base_dir.clone());

        if self.tasks.blocking_send(task).is_err() {
            debug!("Reindex worker gone, dropping change for {relative_path}");
            return None;
        }

        match outcome.recv_timeout(wait) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => {
                error!("Handoff for {relative_path} timed out after {wait:?}");
                Some(TaskOutcome::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Reindex of {relative_path} abandoned");
                Some(TaskOutcome::Cancelled)
            }
        }
    }
}

impl ChangeSink for ReindexOrchestrator {
    fn apply(&mut self, change: FileChange) {
        self.dispatch(change);
    }
}

/// The single task allowed to mutate the index.
pub struct ReindexWorker {
    rx: mpsc::Receiver<ReindexTask>,
    mutator: Arc<dyn IndexMutator>,
    observer: Arc<dyn SyncObserver>,
    state: Arc<SyncState>,
    timeouts: MutationTimeouts,
    cancel: CancellationToken,
}

impl ReindexWorker {
    pub fn new(
        rx: mpsc::Receiver<ReindexTask>,
        mutator: Arc<dyn IndexMutator>,
        observer: Arc<dyn SyncObserver>,
        state: Arc<SyncState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            mutator,
            observer,
            state,
            timeouts: MutationTimeouts::default(),
            cancel,
        }
    }

    pub fn with_timeouts(mut self, timeouts: MutationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Process tasks until cancelled or every sender is gone.
    ///
    /// Cancellation is checked between tasks only. Tasks still queued when
    /// the worker exits are dropped and their senders see
    /// [`TaskOutcome::Cancelled`].
    pub async fn run(mut self) {
        debug!("Reindex worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                task = self.rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            // Delete and reingest are one mutation; never abandon it halfway.
            let outcome = self.execute(&task).await;
            task.finish(outcome);
        }

        let dropped = self.rx.len();
        if dropped > 0 {
            debug!("Dropped {dropped} queued reindex tasks");
        }

        debug!("Reindex worker stopped");
    }

    async fn execute(&self, task: &ReindexTask) -> TaskOutcome {
        let started = Instant::now();
        let bound = self.timeouts.bound_for(task.kind);

        let result = match task.kind {
            ChangeKind::Deleted => {
                tokio::time::timeout(bound, async {
                    let removed = self
                        .mutator
                        .delete_by_path(&task.path, &task.base_dir)
                        .await?;
                    info!(
                        "Removed index for deleted file {} ({removed} chunks)",
                        task.relative_path
                    );
                    Ok::<(), IndexError>(())
                })
                .await
            }
            ChangeKind::Created | ChangeKind::Modified => {
                tokio::time::timeout(bound, async {
                    self.mutator.delete_by_path(&task.path, &task.base_dir).await?;
                    let outcome = self.mutator.ingest(&task.path, &task.base_dir).await?;
                    info!(
                        "Re-indexed {}: {} chunks",
                        task.relative_path, outcome.chunks_created
                    );
                    Ok::<(), IndexError>(())
                })
                .await
            }
        };

        match result {
            Ok(Ok(())) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.state.advance_last_sync(Utc::now());
                self.observer.on_reindex_complete(&task.relative_path, elapsed_ms);
                TaskOutcome::Completed { elapsed_ms }
            }
            Ok(Err(IndexError::NotFound(_))) => {
                info!("{} vanished before ingest, skipping", task.relative_path);
                TaskOutcome::Skipped
            }
            Ok(Err(e)) => {
                error!("Failed to reindex {}: {e}", task.relative_path);
                TaskOutcome::Failed(e.to_string())
            }
            Err(_) => {
                error!("Reindex of {} timed out after {bound:?}", task.relative_path);
                TaskOutcome::TimedOut
            }
        }
    }
}
