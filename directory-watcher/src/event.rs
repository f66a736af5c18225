//! Change events produced by the watcher.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use serde::{Deserialize, Serialize};

/// Semantic kind of a file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// File appeared.
    Created,

    /// File content changed.
    Modified,

    /// File is gone.
    Deleted,
}

impl ChangeKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified OS notification, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl RawChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// The latest not-yet-processed change for one path.
#[derive(Debug, Clone)]
pub struct PendingChange {
    /// Absolute path of the file.
    pub path: PathBuf,

    /// Most recent kind after the atomic-save rule.
    pub kind: ChangeKind,

    /// When the most recent raw event for this path arrived.
    pub detected_at: Instant,
}

/// A finalized change leaving the debouncer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Absolute path of the file.
    pub path: PathBuf,

    /// Path relative to the watch root.
    pub relative_path: String,

    /// Final kind after reclassification.
    pub kind: ChangeKind,
}

/// Translate a notify event into zero or more raw changes.
///
/// Renames are split into a deletion of the source and a creation of the
/// destination. Directory-level, metadata-only and access events produce
/// nothing.
pub fn classify(event: &notify::Event) -> Vec<RawChange> {
    let each = |kind: ChangeKind| -> Vec<RawChange> {
        event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| RawChange::new(p.clone(), kind))
            .collect()
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => each(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => each(ChangeKind::Deleted),
            RenameMode::To => each(ChangeKind::Created),
            RenameMode::Both => {
                let mut changes = Vec::with_capacity(2);
                if let Some(from) = event.paths.first() {
                    changes.push(RawChange::new(from.clone(), ChangeKind::Deleted));
                }
                if let Some(to) = event.paths.get(1).filter(|p| !p.is_dir()) {
                    changes.push(RawChange::new(to.clone(), ChangeKind::Created));
                }
                changes
            }
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .filter(|p| !p.is_dir())
                .map(|p| {
                    let kind = if p.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Deleted
                    };
                    RawChange::new(p.clone(), kind)
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(ChangeKind::Modified),
        EventKind::Remove(_) => each(ChangeKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
