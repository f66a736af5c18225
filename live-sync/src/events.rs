//! Real-time events sent to subscribers.
//!
//! Every event is a JSON object tagged by `event`:
//!
//! ```json
//! {"event": "document_updated", "file": "hr/vacation.md", "type": "modified", "timestamp": "..."}
//! {"event": "reindex_complete", "file": "hr/vacation.md", "time_ms": 41.27, "timestamp": "..."}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liveindex_directory_watcher::ChangeKind;
use liveindex_document_index::IndexedDocument;

/// Index and watcher status, as reported on connect and on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Total stored chunks.
    pub documents_indexed: usize,

    /// Unique indexed documents.
    pub documents: Vec<IndexedDocument>,

    pub watcher_active: bool,

    pub last_sync: Option<DateTime<Utc>>,
}

/// An event on the subscriber wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Greeting sent once when a subscriber connects.
    Connected {
        status: StatusPayload,
        timestamp: DateTime<Utc>,
    },

    /// A finalized change was picked up.
    DocumentUpdated {
        file: String,
        #[serde(rename = "type")]
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    },

    /// A mutation for `file` finished successfully.
    ReindexComplete {
        file: String,
        time_ms: f64,
        timestamp: DateTime<Utc>,
    },

    /// Reply to a `status` request.
    Status {
        #[serde(flatten)]
        status: StatusPayload,
        timestamp: DateTime<Utc>,
    },

    /// Reply to a `ping`.
    Pong { timestamp: DateTime<Utc> },
}

impl LiveEvent {
    pub fn connected(status: StatusPayload) -> Self {
        Self::Connected {
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn document_updated(file: impl Into<String>, change: ChangeKind) -> Self {
        Self::DocumentUpdated {
            file: file.into(),
            change,
            timestamp: Utc::now(),
        }
    }

    /// `elapsed_ms` is rounded to two decimals.
    pub fn reindex_complete(file: impl Into<String>, elapsed_ms: f64) -> Self {
        Self::ReindexComplete {
            file: file.into(),
            time_ms: (elapsed_ms * 100.0).round() / 100.0,
            timestamp: Utc::now(),
        }
    }

    pub fn status(status: StatusPayload) -> Self {
        Self::Status {
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now(),
        }
    }

    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::DocumentUpdated { .. } => "document_updated",
            Self::ReindexComplete { .. } => "reindex_complete",
            Self::Status { .. } => "status",
            Self::Pong { .. } => "pong",
        }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn status() -> StatusPayload {
        StatusPayload {
            documents_indexed: 3,
            documents: vec![IndexedDocument {
                file: "a.md".to_string(),
                chunks: 3,
                updated_at: None,
            }],
            watcher_active: true,
            last_sync: None,
        }
    }

    #[test]
    fn test_document_updated_shape() {
        let event = LiveEvent::document_updated("docs/a.md", ChangeKind::Modified);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "document_updated");
        assert_eq!(value["file"], "docs/a.md");
        assert_eq!(value["type"], "modified");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_reindex_complete_rounds_time() {
        let LiveEvent::ReindexComplete { time_ms, .. } =
            LiveEvent::reindex_complete("a.md", 12.34567)
        else {
            panic!("wrong variant");
        };
        assert_eq!(time_ms, 12.35);
    }

    #[test]
    fn test_status_is_flattened_but_connected_is_nested() {
        let status_value = serde_json::to_value(LiveEvent::status(status())).unwrap();
        assert_eq!(status_value["event"], "status");
        assert_eq!(status_value["documents_indexed"], 3);
        assert_eq!(status_value["watcher_active"], true);
        assert_eq!(status_value["last_sync"], json!(null));

        let connected_value = serde_json::to_value(LiveEvent::connected(status())).unwrap();
        assert_eq!(connected_value["event"], "connected");
        assert_eq!(connected_value["status"]["documents"][0]["file"], "a.md");
    }

    #[test]
    fn test_round_trip_through_json() {
        let event = LiveEvent::document_updated("b.md", ChangeKind::Deleted);
        let text = event.to_json().unwrap();
        let parsed: LiveEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.name(), "document_updated");
    }
}
