//! Shared synchronization state: running flag and last successful sync.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time copy of [`SyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub running: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Running flag and `last_sync`, shared by the supervisor and the worker.
///
/// `last_sync` only moves forward. It is cleared by [`SyncState::reset`],
/// which the supervisor calls on start.
#[derive(Debug, Default)]
pub struct SyncState {
    inner: Mutex<SyncSnapshot>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SyncSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successful mutation finishing at `at`.
    ///
    /// Returns `false` and leaves the state alone when `at` is older than the
    /// current value.
    pub fn advance_last_sync(&self, at: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        match state.last_sync {
            Some(current) if current > at => false,
            _ => {
                state.last_sync = Some(at);
                true
            }
        }
    }

    /// Clear `last_sync` and the running flag.
    pub fn reset(&self) {
        *self.lock() = SyncSnapshot::default();
    }

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        *self.lock()
    }
}
