//! Lifecycle notifications for singleton locks.
//!
//! Each controller owns a [`Notifier`]. Subscribers register a handler for
//! one [`EventKind`] (or for all of them) and are called synchronously, in
//! subscription order, on the task that triggered the event. Nothing is
//! buffered: a handler registered after an event does not see it.

use crate::error::LockError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Kinds of lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An acquire attempt started.
    Locking,
    /// The lock was obtained.
    Locked,
    /// A live lock is held elsewhere.
    Conflict,
    /// An expired lock was deleted before retrying.
    Expired,
    /// A release started.
    Releasing,
    /// The lock record was removed.
    Released,
    /// The persister failed.
    Error,
}

impl EventKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [EventKind; 7] = [
        EventKind::Locking,
        EventKind::Locked,
        EventKind::Conflict,
        EventKind::Expired,
        EventKind::Releasing,
        EventKind::Released,
        EventKind::Error,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Locking => "locking",
            EventKind::Locked => "locked",
            EventKind::Conflict => "conflict",
            EventKind::Expired => "expired",
            EventKind::Releasing => "releasing",
            EventKind::Released => "released",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Notification<'a> {
    /// What happened.
    pub kind: EventKind,

    /// Name of the singleton the event concerns.
    pub singleton: &'a str,

    /// Human-readable description.
    pub message: String,

    /// The failure, for [`EventKind::Error`].
    pub error: Option<&'a LockError>,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Notification<'_>) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: Handler,
}

/// Multicast, unbuffered notification channel.
#[derive(Default)]
pub struct Notifier {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl Notifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every notification of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(handler))
    }

    /// Call `handler` for every notification.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    /// Deliver `notification` to every matching subscriber.
    ///
    /// Handlers are collected first and called without holding the lock, so
    /// a handler may subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, notification: &Notification<'_>) {
        let handlers: Vec<Handler> = {
            let subscriptions = self
                .subscriptions
                .read()
                .unwrap_or_else(|poison| poison.into_inner());
            subscriptions
                .iter()
                .filter(|s| s.kind.is_none_or(|k| k == notification.kind))
                .map(|s| s.handler.clone())
                .collect()
        };

        for handler in handlers {
            handler(notification);
        }
    }

    fn add(&self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(Subscription { id, kind, handler });
        id
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
