//! # Live Sync
//!
//! Keeps the document index in step with a live documents directory and
//! tells connected subscribers about it.
//!
//! ## Pipeline
//!
//! ```text
//!  OS events ──► FileSystemMonitor ──► ChangeCoalescer ──► ReindexOrchestrator
//!                 (notify thread)       (watch thread)       (watch thread)
//!                                                                 │ ReindexTask
//!                                                                 ▼
//!  subscribers ◄── BroadcastHub ◄── HubPublisher ◄──────── ReindexWorker
//!                  (dispatcher)                             (tokio task)
//! ```
//!
//! - The watch thread settles bursts into one change per path and hands
//!   each change to the worker, waiting (bounded) for the outcome.
//! - The worker is the only writer to the index, so mutations never overlap.
//! - Broadcasts are queued and sent by a separate task; a slow subscriber is
//!   dropped, it never stalls reindexing.
//! - [`WatcherSupervisor`] owns the lifecycle; [`LiveIndexContext`] ties the
//!   index, hub and supervisor together for one process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use liveindex_live_sync::{LiveIndexContext, SubscriberSession, SyncConfig, ChannelSubscriber};
//!
//! let config = SyncConfig::load(None)?;
//! liveindex_live_sync::logging::init_with_config(&config.logging);
//!
//! let context = LiveIndexContext::from_config(config)?;
//! context.bootstrap().await;
//!
//! let (subscriber, mut events) = ChannelSubscriber::new(64);
//! let session = SubscriberSession::open(&context, Arc::new(subscriber)).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.to_json()?);
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod connectors;
pub mod context;
pub mod error;
pub mod events;
pub mod logging;
pub mod observer;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod supervisor;

pub use broadcast::{
    BroadcastHub, ChannelSubscriber, DEFAULT_SEND_TIMEOUT, HubPublisher, Subscriber, SubscriberId,
    spawn_dispatcher,
};
pub use config::{BroadcastConfig, LoggingConfig, SyncConfig, WatcherConfig};
pub use connectors::{
    ChangeCallback, Connector, ConnectorConfig, ConnectorError, ConnectorKind, Document,
    DocumentSource, HealthReport, LocalFilesConnector, RemoteConnector,
};
pub use context::{
    DocumentListing, HealthState, HealthStatus, LiveIndexContext, StoreState, WatcherControl,
    WatcherStatus,
};
pub use error::{Result, SyncError};
pub use events::{LiveEvent, StatusPayload};
pub use observer::{BroadcastObserver, SyncObserver};
pub use orchestrator::{
    HANDOFF_SLACK, MutationTimeouts, ReindexOrchestrator, ReindexTask, ReindexWorker, TaskOutcome,
};
pub use session::SubscriberSession;
pub use state::{SyncSnapshot, SyncState};
pub use supervisor::{SupervisorState, SupervisorStatus, WatcherSupervisor};
