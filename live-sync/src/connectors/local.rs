//! Local filesystem source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use liveindex_directory_watcher::{
    ChangeKind, DirectoryWatcher, DocumentScanner, FileChange, WatchScope, WatchSetupError,
    mime_from_extension, relative_path,
};

use super::{
    ChangeCallback, ConnectorConfig, ConnectorError, ConnectorKind, Document, DocumentSource,
    HealthReport, Result,
};

/// Extensions the local source reads.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["md", "txt", "markdown", "rst", "html"];

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Documents in a local directory tree.
///
/// "Authentication" checks that the directory exists, is a directory and
/// can be read. Document ids are paths relative to the directory.
pub struct LocalFilesConnector {
    directory: PathBuf,
    authenticated: bool,
    watcher: Option<DirectoryWatcher>,
}

impl LocalFilesConnector {
    /// Create a connector for the `directory` setting (default `.`).
    pub fn new(config: &ConnectorConfig) -> Self {
        let directory = config.setting_str("directory").unwrap_or(".");
        Self::for_directory(directory)
    }

    pub fn for_directory(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            directory: std::path::absolute(&directory).unwrap_or(directory),
            authenticated: false,
            watcher: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn scope(&self, root: &Path) -> WatchScope {
        WatchScope::new(root).with_extensions(SUPPORTED_EXTENSIONS)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(ConnectorError::NotAuthenticated)
        }
    }
}

impl DocumentSource for LocalFilesConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::LocalFiles
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    fn authenticate(
        &mut self,
        _credentials: Option<&BTreeMap<String, serde_json::Value>>,
    ) -> Result<()> {
        let dir = self.directory.display();
        self.scope(&self.directory).validate().map_err(|e| {
            ConnectorError::Authentication(match e {
                WatchSetupError::RootNotFound(_) => format!("Directory not found: {dir}"),
                WatchSetupError::NotADirectory(_) => format!("Path is not a directory: {dir}"),
                WatchSetupError::PermissionDenied(_) => format!("Directory not readable: {dir}"),
                other => format!("Cannot access directory: {other}"),
            })
        })?;

        self.authenticated = true;
        debug!("Authenticated local source {dir}");
        Ok(())
    }

    fn list_documents(&self, path: Option<&Path>) -> Result<Vec<Document>> {
        self.ensure_authenticated()?;

        let root = match path {
            Some(path) => self.directory.join(path),
            None => self.directory.clone(),
        };

        let files = DocumentScanner::new(self.scope(&root)).scan()?;
        Ok(files
            .iter()
            .filter_map(|file| load_document(&self.directory, &file.path))
            .collect())
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.ensure_authenticated()?;

        let path = self.directory.join(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(load_document(&self.directory, &path))
    }

    fn watch_changes(&mut self, mut callback: ChangeCallback) -> Result<()> {
        self.ensure_authenticated()?;
        if self.watcher.is_some() {
            return Ok(());
        }

        let directory = self.directory.clone();
        let mut watcher = DirectoryWatcher::new(self.scope(&self.directory));
        watcher.start(move |change: FileChange| {
            let document = match change.kind {
                ChangeKind::Deleted => None,
                ChangeKind::Created | ChangeKind::Modified => {
                    load_document(&directory, &change.path)
                }
            };
            callback(change.kind, change.relative_path, document);
        })?;

        info!("Watching local source {}", self.directory.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop_watching(&mut self) -> Result<()> {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop(STOP_TIMEOUT);
        }
        Ok(())
    }

    fn get_permissions(&self, id: &str) -> Result<Vec<String>> {
        Ok(permissions_for(id))
    }

    fn health_check(&self) -> HealthReport {
        let mut report = HealthReport::from_flags(self.authenticated, self.is_watching());
        let exists = self.directory.exists();
        let readable = exists && std::fs::read_dir(&self.directory).is_ok();

        report.details.insert(
            "directory".to_string(),
            self.directory.display().to_string().into(),
        );
        report.details.insert("exists".to_string(), exists.into());
        report.details.insert("readable".to_string(), readable.into());
        report
    }
}

/// Roles derived from the document id.
fn permissions_for(id: &str) -> Vec<String> {
    let id = id.to_lowercase();
    let roles: &[&str] = if id.contains("security") {
        &["admin"]
    } else if id.contains("employee") || id.contains("handbook") {
        &["manager", "admin"]
    } else {
        &[]
    };
    roles.iter().map(ToString::to_string).collect()
}

/// Read a file into a [`Document`]. Unreadable files yield `None`.
fn load_document(root: &Path, path: &Path) -> Option<Document> {
    let metadata = std::fs::metadata(path).ok()?;
    let content = std::fs::read_to_string(path).ok()?;
    let id = relative_path(root, path);

    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or_default()
        .to_lowercase();

    let mut doc_metadata = BTreeMap::new();
    doc_metadata.insert("extension".to_string(), format!(".{extension}").into());
    doc_metadata.insert(
        "directory".to_string(),
        path.parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
            .into(),
    );

    Some(Document {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone()),
        path: path.display().to_string(),
        content,
        content_type: mime_from_extension(&extension).to_string(),
        size: metadata.len(),
        created_at: metadata.created().ok().map(DateTime::<Utc>::from),
        updated_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        metadata: doc_metadata,
        permissions: permissions_for(&id),
        id,
    })
}
