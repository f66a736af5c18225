//! OS-level change notifications for a watch scope.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::config::WatchScope;
use crate::error::Result;
use crate::event::{RawChange, classify};

/// Messages consumed by the watch thread.
#[derive(Debug)]
pub enum WatchMessage {
    /// A filtered raw change.
    Change(RawChange),

    /// Exit the watch loop, discarding pending changes.
    Shutdown,
}

/// Subscribes to OS notifications under a root and forwards filtered changes.
///
/// Notify invokes the callback on its own thread; changes are pushed into a
/// std channel so nothing here depends on an async runtime.
pub struct FileSystemMonitor {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileSystemMonitor {
    /// Validate the scope and register the OS watch.
    pub fn start(scope: &WatchScope, tx: mpsc::Sender<WatchMessage>) -> Result<Self> {
        scope.validate()?;

        let filter = scope.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in classify(&event) {
                        if !filter.matches(&change.path) {
                            continue;
                        }
                        if tx.send(WatchMessage::Change(change)).is_err() {
                            debug!("Watch loop gone, dropping change");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Watch error: {e}");
                }
            },
        )?;

        let mode = if scope.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&scope.root, mode)?;

        info!("Watching {} ({mode:?})", scope.root.display());

        Ok(Self {
            watcher,
            root: scope.root.clone(),
        })
    }

    /// The watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Unregister the OS watch.
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            debug!("Unwatch of {} failed: {e}", self.root.display());
        }
        info!("Stopped watching {}", self.root.display());
    }
}
