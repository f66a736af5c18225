//! Fan-out of live events to connected subscribers.
//!
//! The [`BroadcastHub`] is the only owner of the subscriber set. The pipeline
//! never talks to it directly: it queues events through a [`HubPublisher`]
//! and a dispatcher task does the actual sends, so a slow subscriber can
//! never hold up reindexing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::events::LiveEvent;

/// Default bound on a single subscriber send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// A connected real-time observer.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Deliver one event. An error removes the subscriber.
    async fn send(&self, event: &LiveEvent) -> Result<()>;
}

/// Subscriber backed by a bounded channel.
///
/// The receiving half is typically drained by a connection writer. A full
/// channel makes `send` wait, so the hub's send timeout applies.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::Sender<LiveEvent>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn send(&self, event: &LiveEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| SyncError::Delivery("subscriber channel closed".to_string()))
    }
}

/// Handle identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Registry of connected subscribers.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Set the per-subscriber send bound.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<dyn Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, subscriber);
            subscribers.len()
        };
        debug!("Registered {id}, {count} connected");
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!("Unregistered {id}");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Sends run concurrently, each bounded by the send timeout. Subscribers
    /// that fail or time out are removed; the rest still receive the event.
    /// Returns the number of successful deliveries.
    pub async fn publish(&self, event: &LiveEvent) -> usize {
        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .lock()
            .iter()
            .map(|(id, subscriber)| (*id, subscriber.clone()))
            .collect();

        if targets.is_empty() {
            debug!("No subscribers for {}", event.name());
            return 0;
        }

        let send_timeout = self.send_timeout;
        let sends = targets.iter().map(|(id, subscriber)| async move {
            let result = tokio::time::timeout(send_timeout, subscriber.send(event)).await;
            (*id, result)
        });

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, result) in join_all(sends).await {
            match result {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!("Dropping {id}: {e}");
                    failed.push(id);
                }
                Err(_) => {
                    warn!("Dropping {id}: send timed out after {send_timeout:?}");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.lock();
            for id in &failed {
                subscribers.remove(id);
            }
        }

        debug!(
            "Published {} to {delivered}/{} subscribers",
            event.name(),
            targets.len()
        );
        delivered
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire-and-forget entry point into the hub.
#[derive(Debug, Clone)]
pub struct HubPublisher {
    tx: mpsc::Sender<LiveEvent>,
}

impl HubPublisher {
    /// Queue an event for delivery. Never waits.
    ///
    /// A full queue drops the event with a warning.
    pub fn publish(&self, event: LiveEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Broadcast queue full, dropping {} event", event.name());
            }
            Err(TrySendError::Closed(event)) => {
                debug!("Broadcast dispatcher gone, dropping {} event", event.name());
            }
        }
    }
}

/// Spawn the task that drains queued events into `hub`.
///
/// The task ends once every [`HubPublisher`] clone is dropped.
pub fn spawn_dispatcher(hub: Arc<BroadcastHub>, capacity: usize) -> (HubPublisher, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<LiveEvent>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            hub.publish(&event).await;
        }
        debug!("Broadcast dispatcher stopped");
    });

    (HubPublisher { tx }, handle)
}
