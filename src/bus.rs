//! In-process publish/subscribe for gateway events.
//!
//! Each subscription owns an unbounded FIFO queue. Publishing fans one
//! `Arc<Event>` out to every subscriber whose filter matches, so delivery
//! order is per-subscriber wire order. Dropping a [`Subscription`] detaches
//! it; the sender is pruned on the next publish.
//!
//! Connection lifecycle notifications travel on a separate channel so event
//! consumers never have to filter them out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use guildline_proto::{Event, EventKind};
use parking_lot::RwLock;
use tokio::sync::mpsc;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

/// Why a connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    Requested,
    /// Transport error, close frame or end of stream.
    Faulted(String),
}

/// Connection lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake finished and the connection is open.
    Connected { key: String },
    /// The connection closed.
    Disconnected {
        key: String,
        reason: DisconnectReason,
    },
    /// A reconnect attempt is about to start after `delay`.
    Reconnecting {
        key: String,
        attempt: u32,
        delay: Duration,
    },
}

impl ConnectionEvent {
    /// Key of the connection this notification is about.
    pub fn key(&self) -> &str {
        match self {
            Self::Connected { key }
            | Self::Disconnected { key, .. }
            | Self::Reconnecting { key, .. } => key,
        }
    }
}

struct Subscriber {
    filter: Option<EventKind>,
    tx: mpsc::UnboundedSender<Arc<Event>>,
}

impl Subscriber {
    fn wants(&self, kind: EventKind) -> bool {
        self.filter.is_none_or(|filter| filter == kind)
    }
}

/// Receiving end of a bus subscription.
#[derive(Debug)]
pub struct Subscription<T = Arc<Event>> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next item. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next item if one is queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Lifecycle subscription.
pub type LifecycleSubscription = Subscription<ConnectionEvent>;

/// Fan-out hub between connections and consumers.
pub struct EventBus {
    id: u64,
    subscribers: RwLock<Vec<Subscriber>>,
    lifecycle: RwLock<Vec<mpsc::UnboundedSender<ConnectionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            subscribers: RwLock::new(Vec::new()),
            lifecycle: RwLock::new(Vec::new()),
        }
    }

    /// Process-unique identifier of this bus.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribe to one event kind.
    pub fn subscribe(&self, kind: EventKind) -> Subscription {
        self.add_subscriber(Some(kind))
    }

    /// Subscribe to every event kind.
    pub fn subscribe_all(&self) -> Subscription {
        self.add_subscriber(None)
    }

    fn add_subscriber(&self, filter: Option<EventKind>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(Subscriber { filter, tx });
        Subscription { rx }
    }

    /// Subscribe to connection lifecycle notifications.
    pub fn subscribe_lifecycle(&self) -> LifecycleSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lifecycle.write().push(tx);
        Subscription { rx }
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: Event) -> usize {
        let kind = event.kind();
        let event = Arc::new(event);
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|s| !s.tx.is_closed());

        let delivered = subscribers
            .iter()
            .filter(|s| s.wants(kind))
            .filter(|s| s.tx.send(Arc::clone(&event)).is_ok())
            .count();
        drop(subscribers);

        crate::metrics::record_event(kind.as_str());
        tracing::trace!(kind = %kind, delivered, "Event published");
        delivered
    }

    /// Deliver a lifecycle notification to every lifecycle subscriber.
    pub fn publish_lifecycle(&self, event: ConnectionEvent) -> usize {
        let mut subscribers = self.lifecycle.write();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Number of live subscribers that would receive an event of `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|s| !s.tx.is_closed() && s.wants(kind))
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.id)
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}
