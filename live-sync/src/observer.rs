//! Pipeline lifecycle callbacks.

use liveindex_directory_watcher::ChangeKind;

use crate::broadcast::HubPublisher;
use crate::events::LiveEvent;

/// Receives pipeline notifications.
///
/// `on_file_change` runs on the watch thread and `on_reindex_complete` on
/// the worker task, so implementations must not block.
pub trait SyncObserver: Send + Sync {
    /// Called once per finalized change.
    fn on_file_change(&self, relative_path: &str, kind: ChangeKind);

    /// Called once per successful mutation.
    fn on_reindex_complete(&self, relative_path: &str, elapsed_ms: f64);
}

/// Observer that turns callbacks into broadcast events.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    publisher: HubPublisher,
}

impl BroadcastObserver {
    pub fn new(publisher: HubPublisher) -> Self {
        Self { publisher }
    }
}

impl SyncObserver for BroadcastObserver {
    fn on_file_change(&self, relative_path: &str, kind: ChangeKind) {
        self.publisher
            .publish(LiveEvent::document_updated(relative_path, kind));
    }

    fn on_reindex_complete(&self, relative_path: &str, elapsed_ms: f64) {
        self.publisher
            .publish(LiveEvent::reindex_complete(relative_path, elapsed_ms));
    }
}
