//! The watch thread: OS notifications in, debounced changes out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::coalescer::ChangeCoalescer;
use crate::config::WatchScope;
use crate::error::{Result, WatchSetupError};
use crate::event::FileChange;
use crate::monitor::{FileSystemMonitor, WatchMessage};

/// Default settle window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default time a deleted path gets to reappear.
pub const DEFAULT_DELETE_GRACE: Duration = Duration::from_millis(100);

/// Receives finalized changes on the watch thread.
///
/// Implementations may block; the watch loop waits for `apply` to return
/// before handling the next change.
pub trait ChangeSink: Send + 'static {
    fn apply(&mut self, change: FileChange);
}

impl<F> ChangeSink for F
where
    F: FnMut(FileChange) + Send + 'static,
{
    fn apply(&mut self, change: FileChange) {
        self(change)
    }
}

struct RunningWatch {
    monitor: FileSystemMonitor,
    control: mpsc::Sender<WatchMessage>,
    stopping: Arc<AtomicBool>,
    thread: JoinHandle<()>,
    exited: mpsc::Receiver<()>,
}

/// Watches one scope and delivers debounced changes to a [`ChangeSink`].
pub struct DirectoryWatcher {
    scope: WatchScope,
    debounce: Duration,
    delete_grace: Duration,
    running: Option<RunningWatch>,
}

impl DirectoryWatcher {
    /// Create a watcher for the given scope.
    pub fn new(scope: WatchScope) -> Self {
        Self {
            scope,
            debounce: DEFAULT_DEBOUNCE,
            delete_grace: DEFAULT_DELETE_GRACE,
            running: None,
        }
    }

    /// Set the settle window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the delete recheck grace interval.
    pub fn with_delete_grace(mut self, grace: Duration) -> Self {
        self.delete_grace = grace;
        self
    }

    pub fn scope(&self) -> &WatchScope {
        &self.scope
    }

    /// Check if the watcher is running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Register the OS watch and spawn the watch thread.
    pub fn start<S: ChangeSink>(&mut self, sink: S) -> Result<()> {
        if self.running.is_some() {
            return Err(WatchSetupError::AlreadyWatching(self.scope.root.clone()));
        }

        let (tx, rx) = mpsc::channel();
        let monitor = FileSystemMonitor::start(&self.scope, tx.clone())?;

        let stopping = Arc::new(AtomicBool::new(false));
        let (exited_tx, exited) = mpsc::channel();

        let watch_loop = WatchLoop {
            rx,
            coalescer: ChangeCoalescer::new(self.debounce, self.delete_grace),
            scope: self.scope.clone(),
            stopping: stopping.clone(),
            sink,
        };

        let spawned = std::thread::Builder::new()
            .name("liveindex-watch".to_string())
            .spawn(move || {
                watch_loop.run();
                let _ = exited_tx.send(());
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                monitor.stop();
                return Err(e.into());
            }
        };

        self.running = Some(RunningWatch {
            monitor,
            control: tx,
            stopping,
            thread,
            exited,
        });

        info!(
            "Directory watcher started for {} (debounce {:?})",
            self.scope.root.display(),
            self.debounce
        );
        Ok(())
    }

    /// Tell the watch thread to stop without waiting for it.
    ///
    /// No change is handed to the sink after this returns, apart from one
    /// whose `apply` call is already under way. Pending changes are
    /// discarded. Call [`DirectoryWatcher::stop`] afterwards to join.
    pub fn request_stop(&self) {
        if let Some(running) = &self.running {
            running.stopping.store(true, Ordering::SeqCst);
            let _ = running.control.send(WatchMessage::Shutdown);
        }
    }

    /// Stop the watch thread, discarding pending changes.
    ///
    /// Waits up to `timeout` for the thread to exit. Returns `false` when the
    /// thread had to be detached. Stopping a stopped watcher is a no-op.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.request_stop();
        let Some(running) = self.running.take() else {
            return true;
        };

        running.monitor.stop();

        let joined = match running.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if running.thread.join().is_err() {
                    warn!("Watch thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Watch thread did not exit within {timeout:?}, detaching");
                false
            }
        };

        info!("Directory watcher stopped");
        joined
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.stopping.store(true, Ordering::SeqCst);
            let _ = running.control.send(WatchMessage::Shutdown);
        }
    }
}

struct WatchLoop<S> {
    rx: mpsc::Receiver<WatchMessage>,
    coalescer: ChangeCoalescer,
    scope: WatchScope,
    stopping: Arc<AtomicBool>,
    sink: S,
}

impl<S: ChangeSink> WatchLoop<S> {
    fn run(mut self) {
        debug!("Watch loop running for {}", self.scope.root.display());

        loop {
            let message = match self.coalescer.deadline() {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        self.flush();
                        continue;
                    }
                    match self.rx.recv_timeout(deadline - now) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            match message {
                WatchMessage::Change(change) => self.coalescer.record(change.path, change.kind),
                WatchMessage::Shutdown => {
                    let dropped = self.coalescer.discard();
                    if dropped > 0 {
                        debug!("Discarded {dropped} pending changes on shutdown");
                    }
                    break;
                }
            }

            if self.stopping.load(Ordering::SeqCst) {
                self.coalescer.discard();
                break;
            }
        }

        debug!("Watch loop exited for {}", self.scope.root.display());
    }

    fn flush(&mut self) {
        let settled = self.coalescer.take_settled(Instant::now());
        debug!("Flushing {} settled changes", settled.len());

        for pending in settled {
            if self.stopping.load(Ordering::SeqCst) {
                return;
            }

            let kind = self.coalescer.finalize(&pending);
            let change = FileChange {
                relative_path: self.scope.relative_path(&pending.path),
                path: pending.path,
                kind,
            };
            self.sink.apply(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn collecting_sink() -> (Arc<Mutex<Vec<FileChange>>>, impl ChangeSink) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        (seen, move |change: FileChange| {
            sink_seen.lock().unwrap().push(change);
        })
    }

    fn wait_for(seen: &Arc<Mutex<Vec<FileChange>>>, count: usize, limit: Duration) {
        let start = Instant::now();
        while seen.lock().unwrap().len() < count && start.elapsed() < limit {
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = DirectoryWatcher::new(WatchScope::new(temp_dir.path()));

        watcher.start(|_change: FileChange| {}).unwrap();
        assert!(watcher.is_running());
        assert!(matches!(
            watcher.start(|_change: FileChange| {}),
            Err(WatchSetupError::AlreadyWatching(_))
        ));

        assert!(watcher.stop(Duration::from_secs(5)));
        assert!(!watcher.is_running());
        assert!(watcher.stop(Duration::from_secs(5)));
    }

    #[test]
    fn test_burst_is_delivered_once() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.md");
        std::fs::write(&file, "v1").unwrap();

        let (seen, sink) = collecting_sink();
        let mut watcher = DirectoryWatcher::new(WatchScope::new(temp_dir.path()))
            .with_debounce(Duration::from_millis(300));
        watcher.start(sink).unwrap();

        std::fs::write(&file, "v2").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(&file, "v3").unwrap();

        wait_for(&seen, 1, Duration::from_secs(3));
        std::thread::sleep(Duration::from_millis(400));
        watcher.stop(Duration::from_secs(5));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].relative_path, "a.md");
        assert_eq!(seen[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_filtered_extensions_are_ignored() {
        let temp_dir = TempDir::new().unwrap();

        let (seen, sink) = collecting_sink();
        let mut watcher = DirectoryWatcher::new(WatchScope::new(temp_dir.path()))
            .with_debounce(Duration::from_millis(100));
        watcher.start(sink).unwrap();

        std::fs::write(temp_dir.path().join("image.png"), "x").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();

        wait_for(&seen, 1, Duration::from_secs(3));
        std::thread::sleep(Duration::from_millis(300));
        watcher.stop(Duration::from_secs(5));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].relative_path, "notes.txt");
    }

    #[test]
    fn test_stop_discards_pending_changes() {
        let temp_dir = TempDir::new().unwrap();

        let (seen, sink) = collecting_sink();
        let mut watcher = DirectoryWatcher::new(WatchScope::new(temp_dir.path()))
            .with_debounce(Duration::from_secs(2));
        watcher.start(sink).unwrap();

        std::fs::write(temp_dir.path().join("pending.md"), "x").unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        assert!(watcher.stop(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));

        std::thread::sleep(Duration::from_millis(100));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_request_stop_suppresses_later_flushes() {
        let temp_dir = TempDir::new().unwrap();

        let (seen, sink) = collecting_sink();
        let mut watcher = DirectoryWatcher::new(WatchScope::new(temp_dir.path()))
            .with_debounce(Duration::from_millis(300));
        watcher.start(sink).unwrap();

        std::fs::write(temp_dir.path().join("late.md"), "x").unwrap();
        std::thread::sleep(Duration::from_millis(100));
        watcher.request_stop();

        std::thread::sleep(Duration::from_millis(600));
        assert!(seen.lock().unwrap().is_empty());
        assert!(watcher.is_running());

        assert!(watcher.stop(Duration::from_secs(5)));
        assert!(!watcher.is_running());
    }
}
