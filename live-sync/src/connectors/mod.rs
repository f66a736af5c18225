//! Document sources.
//!
//! Every source exposes the same capability set through [`DocumentSource`].
//! Only local files are implemented; the remote sources are declared so
//! configuration can name them, and every operation on them returns
//! [`ConnectorError::NotSupported`].

mod local;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use liveindex_directory_watcher::{ChangeKind, WatchSetupError};

pub use local::{LocalFilesConnector, SUPPORTED_EXTENSIONS};

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Connector errors.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The source type has no implementation.
    #[error("{0} connector is not supported yet")]
    NotSupported(ConnectorKind),

    /// The source rejected the credentials or the location is unusable.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// An operation was attempted before `authenticate`.
    #[error("not authenticated, call authenticate() first")]
    NotAuthenticated,

    /// Change watching failed.
    #[error("watch failed: {0}")]
    Watch(#[from] WatchSetupError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported source types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    LocalFiles,
    GoogleDrive,
    Notion,
    Slack,
    S3,
    Confluence,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 6] = [
        Self::LocalFiles,
        Self::GoogleDrive,
        Self::Notion,
        Self::Slack,
        Self::S3,
        Self::Confluence,
    ];

    /// Configuration identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalFiles => "local_files",
            Self::GoogleDrive => "google_drive",
            Self::Notion => "notion",
            Self::Slack => "slack",
            Self::S3 => "s3",
            Self::Confluence => "confluence",
        }
    }

    /// Human readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::LocalFiles => "Local Files",
            Self::GoogleDrive => "Google Drive",
            Self::Notion => "Notion",
            Self::Slack => "Slack",
            Self::S3 => "AWS S3",
            Self::Confluence => "Confluence",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::LocalFiles => "Connect to local filesystem documents",
            Self::GoogleDrive => "Connect to Google Drive documents and folders",
            Self::Notion => "Connect to Notion pages and databases",
            Self::Slack => "Connect to Slack messages and files",
            Self::S3 => "Connect to AWS S3 buckets",
            Self::Confluence => "Connect to Confluence pages and spaces",
        }
    }

    pub fn is_implemented(self) -> bool {
        matches!(self, Self::LocalFiles)
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A document from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier unique within the source.
    pub id: String,

    pub name: String,

    /// Full path or URL.
    pub path: String,

    pub content: String,

    /// MIME type.
    pub content_type: String,

    /// Size in bytes.
    pub size: u64,

    pub created_at: Option<DateTime<Utc>>,

    pub updated_at: Option<DateTime<Utc>>,

    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Roles with access. Empty means public.
    pub permissions: Vec<String>,
}

/// Configuration for one connector instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,

    pub connector_type: ConnectorKind,

    #[serde(default, skip_serializing)]
    pub credentials: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ConnectorConfig {
    pub fn new(name: impl Into<String>, connector_type: ConnectorKind) -> Self {
        Self {
            name: name.into(),
            connector_type,
            credentials: BTreeMap::new(),
            settings: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Set one setting.
    pub fn with_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// A string setting, if present.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Connector health, as reported by [`DocumentSource::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub authenticated: bool,
    pub watching: bool,
    pub message: String,
    pub details: BTreeMap<String, serde_json::Value>,
}

impl HealthReport {
    /// Report derived from the authentication and watch flags.
    pub fn from_flags(authenticated: bool, watching: bool) -> Self {
        Self {
            healthy: authenticated,
            authenticated,
            watching,
            message: (if authenticated { "OK" } else { "Not authenticated" }).to_string(),
            details: BTreeMap::new(),
        }
    }
}

/// Change callback: `(kind, document id, document)`. The document is `None`
/// for deletions.
pub type ChangeCallback = Box<dyn FnMut(ChangeKind, String, Option<Document>) + Send + 'static>;

/// Capability set every document source provides.
pub trait DocumentSource: Send {
    fn kind(&self) -> ConnectorKind;

    fn is_authenticated(&self) -> bool;

    fn is_watching(&self) -> bool;

    /// Verify access. `credentials` override the configured ones.
    fn authenticate(
        &mut self,
        credentials: Option<&BTreeMap<String, serde_json::Value>>,
    ) -> Result<()>;

    /// All documents, or those under `path`.
    fn list_documents(&self, path: Option<&Path>) -> Result<Vec<Document>>;

    /// One document by id, `None` if it does not exist.
    fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Start delivering changes to `callback`. A second call is a no-op.
    fn watch_changes(&mut self, callback: ChangeCallback) -> Result<()>;

    fn stop_watching(&mut self) -> Result<()>;

    /// Roles allowed to read `id`. Empty means public.
    fn get_permissions(&self, id: &str) -> Result<Vec<String>>;

    fn health_check(&self) -> HealthReport {
        HealthReport::from_flags(self.is_authenticated(), self.is_watching())
    }
}

/// A declared but unimplemented remote source.
#[derive(Debug, Clone)]
pub struct RemoteConnector {
    config: ConnectorConfig,
}

impl RemoteConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    fn unsupported<T>(&self) -> Result<T> {
        Err(ConnectorError::NotSupported(self.config.connector_type))
    }
}

impl DocumentSource for RemoteConnector {
    fn kind(&self) -> ConnectorKind {
        self.config.connector_type
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn is_watching(&self) -> bool {
        false
    }

    fn authenticate(
        &mut self,
        _credentials: Option<&BTreeMap<String, serde_json::Value>>,
    ) -> Result<()> {
        self.unsupported()
    }

    fn list_documents(&self, _path: Option<&Path>) -> Result<Vec<Document>> {
        self.unsupported()
    }

    fn get_document(&self, _id: &str) -> Result<Option<Document>> {
        self.unsupported()
    }

    fn watch_changes(&mut self, _callback: ChangeCallback) -> Result<()> {
        self.unsupported()
    }

    fn stop_watching(&mut self) -> Result<()> {
        self.unsupported()
    }

    fn get_permissions(&self, _id: &str) -> Result<Vec<String>> {
        self.unsupported()
    }
}

/// A configured source.
pub enum Connector {
    LocalFiles(LocalFilesConnector),
    Remote(RemoteConnector),
}

impl Connector {
    /// Build the connector a configuration names.
    pub fn from_config(config: ConnectorConfig) -> Self {
        match config.connector_type {
            ConnectorKind::LocalFiles => Self::LocalFiles(LocalFilesConnector::new(&config)),
            _ => Self::Remote(RemoteConnector::new(config)),
        }
    }

    /// Root directory of a local connector.
    pub fn local_root(&self) -> Option<PathBuf> {
        match self {
            Self::LocalFiles(local) => Some(local.directory().to_path_buf()),
            Self::Remote(_) => None,
        }
    }

    fn source(&self) -> &dyn DocumentSource {
        match self {
            Self::LocalFiles(local) => local,
            Self::Remote(remote) => remote,
        }
    }

    fn source_mut(&mut self) -> &mut dyn DocumentSource {
        match self {
            Self::LocalFiles(local) => local,
            Self::Remote(remote) => remote,
        }
    }
}

impl DocumentSource for Connector {
    fn kind(&self) -> ConnectorKind {
        self.source().kind()
    }

    fn is_authenticated(&self) -> bool {
        self.source().is_authenticated()
    }

    fn is_watching(&self) -> bool {
        self.source().is_watching()
    }

    fn authenticate(
        &mut self,
        credentials: Option<&BTreeMap<String, serde_json::Value>>,
    ) -> Result<()> {
        self.source_mut().authenticate(credentials)
    }

    fn list_documents(&self, path: Option<&Path>) -> Result<Vec<Document>> {
        self.source().list_documents(path)
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.source().get_document(id)
    }

    fn watch_changes(&mut self, callback: ChangeCallback) -> Result<()> {
        self.source_mut().watch_changes(callback)
    }

    fn stop_watching(&mut self) -> Result<()> {
        self.source_mut().stop_watching()
    }

    fn get_permissions(&self, id: &str) -> Result<Vec<String>> {
        self.source().get_permissions(id)
    }

    fn health_check(&self) -> HealthReport {
        self.source().health_check()
    }
}
