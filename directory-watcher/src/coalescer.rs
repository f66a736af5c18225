//! Debouncing of raw change events.
//!
//! Bursts of events on one path (editor saves, auto-save, formatters) are
//! collapsed into a single change per path. The coalescer is owned by the
//! watch thread, which drives it with [`ChangeCoalescer::deadline`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::{ChangeKind, PendingChange};

/// Collapses raw changes per path over a fixed settle window.
///
/// The window is armed by the first event of a burst. Later events ride the
/// armed deadline instead of pushing it back, so a steady trickle of writes
/// still flushes once per window.
#[derive(Debug)]
pub struct ChangeCoalescer {
    /// Pending changes: path -> latest change.
    pending: HashMap<PathBuf, PendingChange>,

    /// Settle window.
    window: Duration,

    /// How long a deleted path gets to reappear before the deletion is final.
    delete_grace: Duration,

    /// When the current burst settles.
    deadline: Option<Instant>,
}

impl ChangeCoalescer {
    /// Create a new coalescer.
    pub fn new(window: Duration, delete_grace: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
            delete_grace,
            deadline: None,
        }
    }

    /// Record a raw change, overwriting any pending change for the path.
    ///
    /// A creation that follows a pending deletion is recorded as a
    /// modification: that is how atomic saves look from the outside.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        let now = Instant::now();

        let kind = match self.pending.get(&path) {
            Some(prev) if prev.kind == ChangeKind::Deleted && kind == ChangeKind::Created => {
                ChangeKind::Modified
            }
            _ => kind,
        };

        debug!("Recorded {kind} for {}", path.display());
        self.pending.insert(
            path.clone(),
            PendingChange {
                path,
                kind,
                detected_at: now,
            },
        );

        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// When the current burst settles, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Snapshot and clear every pending change once the deadline has passed.
    ///
    /// Returns nothing while the window is still open. Changes come back in
    /// arrival order of their latest event.
    pub fn take_settled(&mut self, now: Instant) -> Vec<PendingChange> {
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return Vec::new(),
        }

        self.deadline = None;
        let mut settled: Vec<PendingChange> = self.pending.drain().map(|(_, c)| c).collect();
        settled.sort_by_key(|c| c.detected_at);
        settled
    }

    /// Decide the final kind of a settled change.
    ///
    /// A deletion whose path still exists, or reappears within the grace
    /// interval, is treated as a modification. Best effort only: a slow
    /// filesystem can still report a real replacement as a deletion.
    pub fn finalize(&self, change: &PendingChange) -> ChangeKind {
        if change.kind != ChangeKind::Deleted {
            return change.kind;
        }

        if change.path.exists() {
            debug!(
                "Reclassifying delete as modify for {} (file present)",
                change.path.display()
            );
            return ChangeKind::Modified;
        }

        std::thread::sleep(self.delete_grace);

        if change.path.exists() {
            debug!(
                "Reclassifying delete as modify for {} (file reappeared)",
                change.path.display()
            );
            ChangeKind::Modified
        } else {
            ChangeKind::Deleted
        }
    }

    /// Drop every pending change without emitting it.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.deadline = None;
        dropped
    }

    /// Check if there are any pending changes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Get the number of pending changes.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread::sleep;
    use tempfile::TempDir;

    fn coalescer(window_ms: u64) -> ChangeCoalescer {
        ChangeCoalescer::new(Duration::from_millis(window_ms), Duration::from_millis(20))
    }

    #[test]
    fn test_burst_collapses_to_latest_kind() {
        let mut c = coalescer(50);
        let path = PathBuf::from("/docs/a.md");

        c.record(path.clone(), ChangeKind::Created);
        c.record(path.clone(), ChangeKind::Modified);
        c.record(path.clone(), ChangeKind::Modified);
        assert_eq!(c.pending_count(), 1);

        assert!(c.take_settled(Instant::now()).is_empty());

        sleep(Duration::from_millis(60));
        let settled = c.take_settled(Instant::now());
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].path, path);
        assert_eq!(settled[0].kind, ChangeKind::Modified);
        assert!(!c.has_pending());
        assert!(c.deadline().is_none());
    }

    #[test]
    fn test_delete_then_create_is_modify() {
        let mut c = coalescer(50);
        let path = PathBuf::from("/docs/b.md");

        c.record(path.clone(), ChangeKind::Deleted);
        c.record(path.clone(), ChangeKind::Created);

        let deadline = c.deadline().unwrap();
        let settled = c.take_settled(deadline);
        assert_eq!(settled[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_later_events_ride_the_armed_deadline() {
        let mut c = coalescer(50);

        c.record(PathBuf::from("/docs/a.md"), ChangeKind::Modified);
        let first = c.deadline().unwrap();

        sleep(Duration::from_millis(10));
        c.record(PathBuf::from("/docs/b.md"), ChangeKind::Created);
        assert_eq!(c.deadline(), Some(first));

        let settled = c.take_settled(first);
        let paths: Vec<_> = settled.iter().map(|s| s.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/docs/a.md"), PathBuf::from("/docs/b.md")]
        );
    }

    #[test]
    fn test_finalize_deleted_but_present() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.md");
        std::fs::write(&path, "content").unwrap();

        let mut c = coalescer(10);
        c.record(path, ChangeKind::Deleted);
        let settled = c.take_settled(c.deadline().unwrap());

        assert_eq!(c.finalize(&settled[0]), ChangeKind::Modified);
    }

    #[test]
    fn test_finalize_deleted_and_absent() {
        let temp_dir = TempDir::new().unwrap();
        let mut c = coalescer(10);
        c.record(temp_dir.path().join("gone.md"), ChangeKind::Deleted);
        let settled = c.take_settled(c.deadline().unwrap());

        assert_eq!(c.finalize(&settled[0]), ChangeKind::Deleted);
    }

    #[test]
    fn test_finalize_deleted_then_reappears_within_grace() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.md");

        let c = ChangeCoalescer::new(Duration::from_millis(10), Duration::from_millis(300));
        let change = PendingChange {
            path: path.clone(),
            kind: ChangeKind::Deleted,
            detected_at: Instant::now(),
        };

        let writer = std::thread::spawn(move || {
            sleep(Duration::from_millis(20));
            std::fs::write(&path, "back").unwrap();
        });

        assert_eq!(c.finalize(&change), ChangeKind::Modified);
        writer.join().unwrap();
    }

    #[test]
    fn test_discard() {
        let mut c = coalescer(50);
        c.record(PathBuf::from("/docs/a.md"), ChangeKind::Modified);
        c.record(PathBuf::from("/docs/b.md"), ChangeKind::Modified);

        assert_eq!(c.discard(), 2);
        assert!(!c.has_pending());
        assert!(c.deadline().is_none());
    }
}
