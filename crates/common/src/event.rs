//! In-process typed pub/sub for lifecycle events.
//!
//! Grounded on the donor's hook-registry pattern (a closed `HookEvent` enum
//! paired with a `#[serde(tag = "event")]` payload enum) but redesigned per
//! the streaming-subscription design note: publishing never blocks, and a
//! slow subscriber drops the newest event (counted) rather than stalling
//! every other subscriber or the publishing task.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

/// Per-subscription channel capacity before drop-newest kicks in.
const SUBSCRIPTION_CAPACITY: usize = 256;

/// Lifecycle topics a subscriber can observe. Closed set — no reflection,
/// no dynamically registered topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SessionCreated,
    SessionTouched,
    SessionDeleted,
    SessionExpired,
    ContextCreated,
    ContextClosed,
    BrowserCreated,
    BrowserReleased,
    BrowserRemoved,
    BrowserRestarted,
    PoolSaturated,
    StoreDegraded,
    StoreHealthy,
}

/// Typed payload carried with each event. The discriminant in the wire form
/// (`event`) always matches the `EventKind` returned by [`Event::kind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    SessionCreated { session_id: String, user_id: String },
    SessionTouched { session_id: String },
    SessionDeleted { session_id: String },
    SessionExpired { session_id: String },
    ContextCreated { context_id: String, session_id: String },
    ContextClosed { context_id: String },
    BrowserCreated { browser_id: String },
    BrowserReleased { browser_id: String, session_id: String },
    BrowserRemoved { browser_id: String, reason: String },
    BrowserRestarted { browser_id: String },
    PoolSaturated { queued: usize, oldest_wait_ms: u64 },
    StoreDegraded { reason: String },
    StoreHealthy,
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SessionCreated { .. } => EventKind::SessionCreated,
            Self::SessionTouched { .. } => EventKind::SessionTouched,
            Self::SessionDeleted { .. } => EventKind::SessionDeleted,
            Self::SessionExpired { .. } => EventKind::SessionExpired,
            Self::ContextCreated { .. } => EventKind::ContextCreated,
            Self::ContextClosed { .. } => EventKind::ContextClosed,
            Self::BrowserCreated { .. } => EventKind::BrowserCreated,
            Self::BrowserReleased { .. } => EventKind::BrowserReleased,
            Self::BrowserRemoved { .. } => EventKind::BrowserRemoved,
            Self::BrowserRestarted { .. } => EventKind::BrowserRestarted,
            Self::PoolSaturated { .. } => EventKind::PoolSaturated,
            Self::StoreDegraded { .. } => EventKind::StoreDegraded,
            Self::StoreHealthy => EventKind::StoreHealthy,
        }
    }
}

struct Subscriber {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

/// Handle returned to a subscriber: a receiver plus a live count of events
/// dropped because the subscriber fell behind.
pub struct Subscription {
    pub rx: mpsc::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Publish-side handle shared across components (BP, PM, SS, SM, AE, CS).
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Every subscriber gets its own bounded
    /// channel; a publish never awaits a slow reader.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers.lock().await.push(Subscriber {
            tx,
            dropped: Arc::clone(&dropped),
        });
        Subscription { rx, dropped }
    }

    /// Publish an event to every live subscriber. Non-blocking: a full
    /// channel means that subscriber drops this event and its counter
    /// increments. Dead subscribers (receiver gone) are pruned lazily.
    pub async fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sub| {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                },
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    #[must_use]
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe().await;
        bus.publish(Event::BrowserCreated {
            browser_id: "b1".into(),
        })
        .await;
        let event = sub.rx.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::BrowserCreated);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_newest_without_blocking_publisher() {
        let bus = EventBus::new();
        let sub = bus.subscribe().await;
        for i in 0..SUBSCRIPTION_CAPACITY + 10 {
            bus.publish(Event::BrowserRestarted {
                browser_id: format!("b{i}"),
            })
            .await;
        }
        assert!(sub.dropped_count() >= 10);
    }

    #[tokio::test]
    async fn dead_subscriber_is_pruned() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe().await;
            assert_eq!(bus.subscriber_count().await, 1);
        }
        // subscription dropped, receiver closed
        bus.publish(Event::StoreHealthy).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }
}
