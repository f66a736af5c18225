//! # Directory Watcher
//!
//! Change detection for a live documents directory. OS notifications are
//! filtered to an extension allow-list, debounced per path, and handed to a
//! [`ChangeSink`] on a dedicated watch thread.
//!
//! ## Features
//!
//! - **Real-time Watching**: Recursive OS notifications under one root
//! - **Debouncing**: One change per path per settle window
//! - **Atomic-save Detection**: Delete-then-recreate is reported as a modify
//! - **Scanning**: One-shot walks for full resyncs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchScope ──► FileSystemMonitor ──► ChangeCoalescer           │
//! │                       │                     │                   │
//! │                       ▼                     ▼                   │
//! │                  RawChange  ──(watch thread)──► ChangeSink      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod coalescer;
pub mod config;
pub mod error;
pub mod event;
pub mod monitor;
pub mod scanner;
pub mod watcher;

pub use coalescer::ChangeCoalescer;
pub use config::{DEFAULT_EXTENSIONS, WatchScope, normalize_extension, relative_path};
pub use error::{Result, WatchSetupError};
pub use event::{ChangeKind, FileChange, PendingChange, RawChange};
pub use monitor::{FileSystemMonitor, WatchMessage};
pub use scanner::{DocumentScanner, ScannedFile, mime_from_extension};
pub use watcher::{ChangeSink, DEFAULT_DEBOUNCE, DEFAULT_DELETE_GRACE, DirectoryWatcher};
