//! End-to-end tests: real directory, real watcher, in-memory index.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc;

use liveindex_directory_watcher::ChangeKind;
use liveindex_document_index::{
    DocumentIndex, EmbeddingProviderType, IndexError, IndexMutator, IngestOutcome,
    Result as IndexResult,
};
use liveindex_live_sync::{
    ChannelSubscriber, LiveEvent, LiveIndexContext, SubscriberSession, SyncConfig, WatcherControl,
};

fn config_for(root: &Path, debounce_ms: u64) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.documents_path = root.to_path_buf();
    config.watcher.debounce_ms = debounce_ms;
    config.index.embedding.provider = EmbeddingProviderType::Hashing;
    config.index.embedding.dimension = Some(64);
    config
}

async fn collect_for(rx: &mut mpsc::Receiver<LiveEvent>, window: Duration) -> Vec<LiveEvent> {
    let deadline = Instant::now() + window;
    let mut events = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) | Err(_) => return events,
        }
    }
}

fn updates(events: &[LiveEvent]) -> Vec<(String, ChangeKind)> {
    events
        .iter()
        .filter_map(|event| match event {
            LiveEvent::DocumentUpdated { file, change, .. } => Some((file.clone(), *change)),
            _ => None,
        })
        .collect()
}

fn completions(events: &[LiveEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            LiveEvent::ReindexComplete { file, .. } => Some(file.clone()),
            _ => None,
        })
        .collect()
}

async fn subscribe(
    context: &LiveIndexContext,
) -> Result<(SubscriberSession, mpsc::Receiver<LiveEvent>)> {
    let (subscriber, mut rx) = ChannelSubscriber::new(64);
    let session = SubscriberSession::open(context, Arc::new(subscriber)).await?;

    let greeting = rx.recv().await;
    assert!(matches!(greeting, Some(LiveEvent::Connected { .. })));
    Ok((session, rx))
}

#[tokio::test(flavor = "multi_thread")]
async fn burst_of_writes_reindexes_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("a.md");
    std::fs::write(&file, "first version")?;

    let context = LiveIndexContext::from_config(config_for(temp_dir.path(), 300))?;
    assert!(matches!(
        context.start_watcher(None).await,
        WatcherControl::Started { .. }
    ));

    let status = context.status().await?;
    assert!(status.watcher_active);
    assert_eq!(status.last_sync, None);

    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::write(&file, "second version")?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(&file, "third version")?;

    let events = collect_for(&mut rx, Duration::from_secs(3)).await;
    assert_eq!(updates(&events), vec![("a.md".to_string(), ChangeKind::Modified)]);
    assert_eq!(completions(&events), vec!["a.md".to_string()]);

    let status = context.status().await?;
    assert!(status.last_sync.is_some());
    assert_eq!(status.documents.len(), 1);
    assert_eq!(status.documents[0].file, "a.md");

    let hits = context.search("third version", Some(1)).await?;
    assert_eq!(hits[0].chunk, "third version");

    context.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn atomic_save_is_reported_as_modified() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("b.md");
    std::fs::write(&file, "original")?;

    let context = LiveIndexContext::from_config(config_for(temp_dir.path(), 300))?;
    context.start_watcher(None).await;
    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::remove_file(&file)?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    std::fs::write(&file, "rewritten")?;

    let events = collect_for(&mut rx, Duration::from_secs(3)).await;
    assert_eq!(updates(&events), vec![("b.md".to_string(), ChangeKind::Modified)]);
    assert_eq!(completions(&events), vec!["b.md".to_string()]);

    context.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_file_leaves_the_index() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("old.md");
    std::fs::write(&file, "soon gone")?;

    let context = LiveIndexContext::from_config(config_for(temp_dir.path(), 200))?;
    context.resync(None).await?;
    assert_eq!(context.documents().await?.count, 1);

    context.start_watcher(None).await;
    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::remove_file(&file)?;

    let events = collect_for(&mut rx, Duration::from_secs(3)).await;
    assert_eq!(updates(&events), vec![("old.md".to_string(), ChangeKind::Deleted)]);
    assert_eq!(completions(&events), vec!["old.md".to_string()]);
    assert_eq!(context.documents().await?.count, 0);

    context.shutdown().await;
    Ok(())
}

/// Fails every mutation for one file name and delegates the rest.
struct RejectingMutator {
    reject: &'static str,
    inner: Arc<DocumentIndex>,
}

#[async_trait]
impl IndexMutator for RejectingMutator {
    async fn delete_by_path(&self, path: &Path, base_dir: &Path) -> IndexResult<usize> {
        self.inner.delete_by_path(path, base_dir).await
    }

    async fn ingest(&self, path: &Path, base_dir: &Path) -> IndexResult<IngestOutcome> {
        if path.ends_with(self.reject) {
            return Err(IndexError::Store("embedding service unavailable".to_string()));
        }
        self.inner.ingest(path, base_dir).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_mutation_does_not_stop_the_pipeline() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = config_for(temp_dir.path(), 200);
    let index = Arc::new(DocumentIndex::from_config(&config.index)?);
    let mutator = Arc::new(RejectingMutator {
        reject: "c.md",
        inner: index.clone(),
    });

    let context = LiveIndexContext::with_mutator(config, index, mutator);
    context.start_watcher(None).await;
    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::write(temp_dir.path().join("c.md"), "will fail")?;
    let events = collect_for(&mut rx, Duration::from_secs(2)).await;
    assert_eq!(updates(&events).len(), 1);
    assert!(completions(&events).is_empty());
    assert_eq!(context.status().await?.last_sync, None);
    assert!(context.watcher_status().await.running);

    std::fs::write(temp_dir.path().join("d.md"), "will succeed")?;
    let events = collect_for(&mut rx, Duration::from_secs(2)).await;
    assert_eq!(completions(&events), vec!["d.md".to_string()]);
    assert!(context.status().await?.last_sync.is_some());

    context.shutdown().await;
    Ok(())
}

/// Records how many mutations overlap.
#[derive(Default)]
struct OverlapCounter {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    ingested: AtomicUsize,
}

#[async_trait]
impl IndexMutator for OverlapCounter {
    async fn delete_by_path(&self, _path: &Path, _base_dir: &Path) -> IndexResult<usize> {
        Ok(0)
    }

    async fn ingest(&self, _path: &Path, _base_dir: &Path) -> IndexResult<IngestOutcome> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.ingested.fetch_add(1, Ordering::SeqCst);
        Ok(IngestOutcome { chunks_created: 1 })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn mutations_never_overlap() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = config_for(temp_dir.path(), 200);
    let index = Arc::new(DocumentIndex::from_config(&config.index)?);
    let counter = Arc::new(OverlapCounter::default());

    let context = LiveIndexContext::with_mutator(config, index, counter.clone());
    context.start_watcher(None).await;

    for i in 0..5 {
        std::fs::write(temp_dir.path().join(format!("doc-{i}.md")), format!("body {i}"))?;
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while counter.ingested.load(Ordering::SeqCst) < 5 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(counter.ingested.load(Ordering::SeqCst), 5);
    assert_eq!(counter.max_in_flight.load(Ordering::SeqCst), 1);

    context.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_discards_pending_changes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let context = LiveIndexContext::from_config(config_for(temp_dir.path(), 3_000))?;
    context.start_watcher(None).await;
    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::write(temp_dir.path().join("pending.md"), "never indexed")?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    assert_eq!(context.stop_watcher().await, WatcherControl::Stopped);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(context.stop_watcher().await, WatcherControl::NotRunning);

    let events = collect_for(&mut rx, Duration::from_millis(3_500)).await;
    assert!(updates(&events).is_empty());

    let status = context.watcher_status().await;
    assert!(!status.running);
    assert_eq!(status.directory, None);
    assert_eq!(context.documents().await?.count, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rename_is_a_delete_and_a_create() -> Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(temp_dir.path().join("draft.md"), "moving soon")?;

    let context = LiveIndexContext::from_config(config_for(temp_dir.path(), 200))?;
    context.resync(None).await?;
    context.start_watcher(None).await;
    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::rename(
        temp_dir.path().join("draft.md"),
        temp_dir.path().join("final.md"),
    )?;

    let events = collect_for(&mut rx, Duration::from_secs(3)).await;
    let mut changes = updates(&events);
    changes.sort_by_key(|(file, _)| file.clone());
    assert_eq!(
        changes,
        vec![
            ("draft.md".to_string(), ChangeKind::Deleted),
            ("final.md".to_string(), ChangeKind::Created),
        ]
    );

    let listing = context.documents().await?;
    let files: Vec<&str> = listing.documents.iter().map(|d| d.file.as_str()).collect();
    assert_eq!(files, vec!["final.md"]);

    context.shutdown().await;
    Ok(())
}

/// Delegates to the index, pausing between the delete and the reingest.
struct PausingMutator {
    pause: Duration,
    inner: Arc<DocumentIndex>,
}

#[async_trait]
impl IndexMutator for PausingMutator {
    async fn delete_by_path(&self, path: &Path, base_dir: &Path) -> IndexResult<usize> {
        self.inner.delete_by_path(path, base_dir).await
    }

    async fn ingest(&self, path: &Path, base_dir: &Path) -> IndexResult<IngestOutcome> {
        tokio::time::sleep(self.pause).await;
        self.inner.ingest(path, base_dir).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_lets_running_reindex_finish() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("a.md");
    std::fs::write(&file, "before the edit")?;

    let config = config_for(temp_dir.path(), 100);
    let index = Arc::new(DocumentIndex::from_config(&config.index)?);
    let mutator = Arc::new(PausingMutator {
        pause: Duration::from_millis(1_500),
        inner: index.clone(),
    });
    let context = LiveIndexContext::with_mutator(config, index, mutator);
    context.resync(None).await?;
    assert_eq!(context.documents().await?.count, 1);

    context.start_watcher(None).await;
    let (_session, mut rx) = subscribe(&context).await?;

    std::fs::write(&file, "after the edit")?;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let started = Instant::now();
    assert_eq!(context.stop_watcher().await, WatcherControl::Stopped);
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(file.exists());
    assert_eq!(context.documents().await?.count, 1);
    let hits = context.search("after the edit", Some(1)).await?;
    assert_eq!(hits[0].chunk, "after the edit");

    let events = collect_for(&mut rx, Duration::from_millis(500)).await;
    assert_eq!(completions(&events), vec!["a.md".to_string()]);
    assert!(context.status().await?.last_sync.is_some());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_control_reports() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let missing = temp_dir.path().join("missing");
    let context = LiveIndexContext::from_config(config_for(&missing, 200))?;

    context.bootstrap().await;
    assert!(!context.watcher_status().await.running);

    let WatcherControl::Error { message } = context.start_watcher(None).await else {
        panic!("expected an error for a missing directory");
    };
    assert!(message.starts_with("Directory not found"));

    let started = context
        .start_watcher(Some(temp_dir.path().to_path_buf()))
        .await;
    assert!(matches!(started, WatcherControl::Started { .. }));

    let again = context
        .start_watcher(Some(temp_dir.path().to_path_buf()))
        .await;
    assert!(matches!(again, WatcherControl::AlreadyRunning { .. }));

    let status = context.watcher_status().await;
    assert!(status.running);
    assert!(status.directory.is_some());

    let json = serde_json::to_value(context.stop_watcher().await)?;
    assert_eq!(json["status"], "stopped");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn session_answers_ping_and_status() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let context = LiveIndexContext::from_config(config_for(temp_dir.path(), 200))?;
    let (session, _rx) = subscribe(&context).await?;
    assert_eq!(context.hub().subscriber_count(), 1);

    let pong = session.handle_message(&context, "ping").await?;
    assert!(matches!(pong, Some(LiveEvent::Pong { .. })));

    let Some(LiveEvent::Status { status, .. }) = session.handle_message(&context, "status").await?
    else {
        panic!("expected a status reply");
    };
    assert!(!status.watcher_active);
    assert_eq!(status.documents_indexed, 0);

    assert_eq!(session.handle_message(&context, "subscribe me").await?, None);

    session.close();
    assert_eq!(context.hub().subscriber_count(), 0);

    let health = serde_json::to_value(context.health().await)?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["store"], "connected");
    Ok(())
}
