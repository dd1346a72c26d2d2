//! Event bus - tagged publish/subscribe between senders and engines
//!
//! Events are fire-and-forget: publishing never waits for a consumer and
//! nothing is acknowledged back to the sender. Engines subscribe and filter
//! by tag prefix themselves.

use async_trait::async_trait;
use minion_events::EventEnvelope;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::FireError;

/// Default broadcast capacity
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Returned by senders that have no event sink to fire at
pub const NO_EVENT_MODULE: &str = "Event module not available.";

/// In-process event bus backed by a tokio broadcast channel
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

/// Shared handle to the bus
pub type SharedBus = Arc<EventBus>;

/// Create a bus with the default capacity
pub fn create_bus() -> SharedBus {
    create_bus_with_capacity(DEFAULT_BUS_CAPACITY)
}

/// Create a bus with an explicit capacity (minimum 1)
pub fn create_bus_with_capacity(capacity: usize) -> SharedBus {
    Arc::new(EventBus::new(capacity))
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an envelope to all current subscribers
    ///
    /// Returns the number of subscribers that will see the event. Zero
    /// subscribers is not an error on a fire-and-forget bus.
    pub fn publish(&self, event: EventEnvelope) -> usize {
        let tag = event.tag.clone();
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!(%tag, "Event fired with no subscribers");
                0
            }
        }
    }

    /// Stamp `data` under `tag` and publish it
    pub fn emit(&self, data: Value, tag: &str) -> usize {
        self.publish(EventEnvelope::new(tag, data))
    }

    /// Get a receiver for every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Destination for command events fired by module functions
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Fire `data` under `tag`
    async fn fire(&self, data: Value, tag: &str) -> Result<(), FireError>;
}

#[async_trait]
impl EventSink for EventBus {
    async fn fire(&self, data: Value, tag: &str) -> Result<(), FireError> {
        self.emit(data, tag);
        Ok(())
    }
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    async fn fire(&self, data: Value, tag: &str) -> Result<(), FireError> {
        (**self).fire(data, tag).await
    }
}
