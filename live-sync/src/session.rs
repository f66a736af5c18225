//! One connected real-time subscriber.

use std::sync::Arc;

use tracing::{debug, info};

use crate::broadcast::{BroadcastHub, Subscriber, SubscriberId};
use crate::context::LiveIndexContext;
use crate::error::Result;
use crate::events::LiveEvent;

/// A registered subscriber plus its request handling.
///
/// The subscriber is unregistered when the session is dropped.
pub struct SubscriberSession {
    id: SubscriberId,
    hub: Arc<BroadcastHub>,
}

impl SubscriberSession {
    /// Greet the subscriber with a `connected` event, then register it.
    ///
    /// A subscriber that cannot take the greeting is never registered.
    pub async fn open(context: &LiveIndexContext, subscriber: Arc<dyn Subscriber>) -> Result<Self> {
        let status = context.status().await?;
        subscriber.send(&LiveEvent::connected(status)).await?;

        let hub = context.hub().clone();
        let id = hub.register(subscriber);
        info!("Subscriber connected ({id}), total {}", hub.subscriber_count());

        Ok(Self { id, hub })
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Answer an inbound text message.
    ///
    /// `ping` gets a `pong`, `status` gets a `status` event. Anything else is
    /// ignored.
    pub async fn handle_message(
        &self,
        context: &LiveIndexContext,
        message: &str,
    ) -> Result<Option<LiveEvent>> {
        match message.trim() {
            "ping" => Ok(Some(LiveEvent::pong())),
            "status" => Ok(Some(LiveEvent::status(context.status().await?))),
            other => {
                debug!("Ignoring message from {}: {other:?}", self.id);
                Ok(None)
            }
        }
    }

    /// Disconnect explicitly.
    pub fn close(self) {}
}

impl Drop for SubscriberSession {
    fn drop(&mut self) {
        if self.hub.unregister(self.id) {
            info!(
                "Subscriber disconnected ({}), total {}",
                self.id,
                self.hub.subscriber_count()
            );
        }
    }
}
