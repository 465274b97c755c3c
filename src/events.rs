//! Domain events published after committed state changes.
//!
//! Consumers (presence updates, welcome messages) subscribe to the bus; the
//! publisher never waits on them.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default channel capacity for [`BroadcastEventBus`].
const DEFAULT_CAPACITY: usize = 256;

/// A Discord account was linked to, or re-linked on, a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionUpdated {
    pub principal_id: Uuid,
    pub connection_id: Uuid,
    pub discord_id: i64,
    pub nickname: String,
    /// Previous owner when the account changed hands
    pub transferred_from: Option<Uuid>,
}

/// Sink for connection events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ConnectionUpdated);
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<ConnectionUpdated>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionUpdated> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for BroadcastEventBus {
    fn publish(&self, event: ConnectionUpdated) {
        // send only fails when nobody is subscribed.
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "Published connection event"),
            Err(_) => tracing::debug!("Connection event published with no subscribers"),
        }
    }
}
