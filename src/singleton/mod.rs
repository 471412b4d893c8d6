//! The singleton lock controller.
//!
//! A [`Singleton`] names one logical resource and drives the acquisition
//! protocol against a shared [`Persister`]:
//!
//! 1. Ask the persister to create the record for the name
//! 2. On conflict, inspect the existing record's creation time
//! 3. If expiry is configured and the record is older than the threshold,
//!    delete it and try to create once more
//!
//! Only one retry is ever made per `acquire`, and expiry is only checked on
//! the first conflict. Every step is published to subscribers in the fixed
//! order `locking` → [`expired` →] (`locked` | `conflict` | `error`).
//!
//! # Concurrency
//!
//! The controller adds no synchronization of its own. Mutual exclusion
//! between processes comes solely from the persister's atomic
//! create-if-absent. Calling `acquire` and `release` concurrently on the
//! same controller is racy, just as it is against the backend directly.
//!
//! # Shutdown
//!
//! The controller never installs signal handlers. The application owns a
//! [`ShutdownRegistry`]; a controller built with
//! [`Singleton::with_shutdown`] joins it once, after its first successful
//! acquire, and is released by the registry when a termination signal
//! arrives.

mod expiry;
mod options;


pub use expiry::is_expired;
pub use options::LockOptions;

use crate::error::{LockError, Result};
use crate::notify::{EventKind, Notification, Notifier, SubscriptionId};
use crate::persister::{PersistOutcome, Persister};
use crate::shutdown::ShutdownRegistry;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Process-level mutual exclusion for one named resource.
///
/// Cloning is cheap; clones share state, subscribers, and the persister.
#[derive(Clone)]
pub struct Singleton {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    persister: Arc<dyn Persister>,
    options: LockOptions,
    notifier: Notifier,
    held: AtomicBool,
    signaled_for_shutdown: AtomicBool,
    registered: AtomicBool,
    shutdown: OnceLock<ShutdownRegistry>,
}

/// Non-owning handle held by a [`ShutdownRegistry`].
#[derive(Clone)]
pub(crate) struct WeakSingleton(Weak<Inner>);

impl WeakSingleton {
    pub(crate) fn upgrade(&self) -> Option<Singleton> {
        self.0.upgrade().map(|inner| Singleton { inner })
    }

    pub(crate) fn is(&self, singleton: &Singleton) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&singleton.inner))
    }
}

impl Singleton {
    /// Create a controller for `name` backed by `persister`.
    ///
    /// # Errors
    ///
    /// * `LockError::InvalidName` - `name` is empty
    pub fn new(
        name: impl Into<String>,
        persister: Arc<dyn Persister>,
        options: LockOptions,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::InvalidName("name must not be empty".to_string()));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                persister,
                options,
                notifier: Notifier::new(),
                held: AtomicBool::new(false),
                signaled_for_shutdown: AtomicBool::new(false),
                registered: AtomicBool::new(false),
                shutdown: OnceLock::new(),
            }),
        })
    }

    /// Join `registry` after the first successful acquire.
    ///
    /// Only the first registry attached to a controller is kept.
    pub fn with_shutdown(self, registry: &ShutdownRegistry) -> Self {
        let _ = self.inner.shutdown.set(registry.clone());
        self
    }

    /// The resource name this controller locks.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Options given at construction.
    pub fn options(&self) -> &LockOptions {
        &self.inner.options
    }

    /// Whether this controller created the lock record and has not released
    /// it since. A later acquire that hits a conflict leaves this unchanged.
    pub fn is_held(&self) -> bool {
        self.inner.held.load(Ordering::SeqCst)
    }

    /// Whether a termination signal triggered this controller's release.
    pub fn is_signaled_for_shutdown(&self) -> bool {
        self.inner.signaled_for_shutdown.load(Ordering::SeqCst)
    }

    /// The notification channel.
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Call `handler` for every notification of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(kind, handler)
    }

    /// Call `handler` for every notification.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe_all(handler)
    }

    /// Try to obtain the lock.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - This call created the lock record
    /// * `Ok(false)` - A live lock exists (or expiry is disabled)
    /// * `Err(_)` - The persister failed; also published as `error`
    pub async fn acquire(&self) -> Result<bool> {
        let name = self.name();
        self.emit(
            EventKind::Locking,
            format!("Attempting lock for singleton '{}'.", name),
        );

        let created = match self.persist().await? {
            PersistOutcome::Created => return Ok(true),
            PersistOutcome::Conflict { created: None } => {
                self.emit_vanished_conflict();
                return Ok(false);
            }
            PersistOutcome::Conflict {
                created: Some(created),
            } => created,
        };

        let expired = self
            .inner
            .options
            .expiry_seconds()
            .is_some_and(|secs| is_expired(created, Utc::now(), secs));

        if !expired {
            self.emit(
                EventKind::Conflict,
                format!(
                    "A non-expired lock (created {}) for singleton '{}' already exists.",
                    created.to_rfc3339(),
                    name
                ),
            );
            return Ok(false);
        }

        if let Err(err) = self.inner.persister.delete_lock(name).await {
            return Err(self.fail(err));
        }
        self.emit(
            EventKind::Expired,
            format!(
                "Automatically deleted expired lock (created {}) for singleton '{}'.",
                created.to_rfc3339(),
                name
            ),
        );

        match self.persist().await? {
            PersistOutcome::Created => Ok(true),
            PersistOutcome::Conflict { created: newer } => {
                self.emit(
                    EventKind::Conflict,
                    retry_conflict_message(name, created, newer),
                );
                Ok(false)
            }
        }
    }

    /// [`acquire`](Self::acquire), then hand the result to `callback`.
    pub async fn acquire_with<F>(&self, callback: F) -> Result<bool>
    where
        F: FnOnce(&Result<bool>),
    {
        let result = self.acquire().await;
        callback(&result);
        result
    }

    /// Remove this controller's lock record.
    ///
    /// No ownership check is made: any controller for the name can release
    /// it, and releasing a missing record succeeds.
    ///
    /// When the release was triggered by a termination signal and succeeds,
    /// the process exits: immediately if the controller has no registry,
    /// otherwise once the registry has released all of its controllers.
    pub async fn release(&self) -> Result<()> {
        let name = self.name();
        let signaled = self.is_signaled_for_shutdown();

        let message = if signaled {
            format!(
                "Attempting automatic lock release of singleton '{}' since the process received a termination signal.",
                name
            )
        } else {
            format!("Attempting lock release of singleton '{}'.", name)
        };
        self.emit(EventKind::Releasing, message);

        if let Err(err) = self.inner.persister.delete_lock(name).await {
            return Err(self.fail(err));
        }

        self.inner.held.store(false, Ordering::SeqCst);
        self.emit(
            EventKind::Released,
            format!("Lock successfully released for singleton '{}'.", name),
        );

        if signaled && self.inner.shutdown.get().is_none() {
            std::process::exit(0);
        }
        Ok(())
    }

    /// [`release`](Self::release), then hand the result to `callback`.
    pub async fn release_with<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&Result<()>),
    {
        let result = self.release().await;
        callback(&result);
        result
    }

    /// Release because the process is shutting down.
    pub async fn release_on_signal(&self) -> Result<()> {
        self.inner
            .signaled_for_shutdown
            .store(true, Ordering::SeqCst);
        self.release().await
    }

    /// Whether a lock record currently exists for the name.
    ///
    /// Read-only: publishes no notifications.
    pub async fn check_exists(&self) -> Result<bool> {
        self.inner.persister.lock_exists(self.name()).await
    }

    /// [`check_exists`](Self::check_exists), then hand the result to
    /// `callback`.
    pub async fn check_exists_with<F>(&self, callback: F) -> Result<bool>
    where
        F: FnOnce(&Result<bool>),
    {
        let result = self.check_exists().await;
        callback(&result);
        result
    }

    pub(crate) fn downgrade(&self) -> WeakSingleton {
        WeakSingleton(Arc::downgrade(&self.inner))
    }

    /// One create-if-absent attempt. Success is recorded and published here;
    /// conflicts are left to the caller.
    async fn persist(&self) -> Result<PersistOutcome> {
        let outcome = match self.inner.persister.persist_lock(self.name()).await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail(err)),
        };

        if outcome == PersistOutcome::Created {
            self.inner.held.store(true, Ordering::SeqCst);
            self.register_for_shutdown();
            self.emit(
                EventKind::Locked,
                format!("Lock successfully obtained for singleton '{}'.", self.name()),
            );
        }
        Ok(outcome)
    }

    fn register_for_shutdown(&self) {
        if let Some(registry) = self.inner.shutdown.get()
            && !self.inner.registered.swap(true, Ordering::SeqCst)
        {
            registry.register(self);
        }
    }

    fn emit_vanished_conflict(&self) {
        self.emit(
            EventKind::Conflict,
            format!(
                "A lock for singleton '{}' existed at the moment this one was being locked but is no longer there.",
                self.name()
            ),
        );
    }

    fn emit(&self, kind: EventKind, message: String) {
        self.inner.notifier.publish(&Notification {
            kind,
            singleton: self.name(),
            message,
            error: None,
        });
    }

    /// Publish `err` and hand it back for the caller's error channel.
    fn fail(&self, err: LockError) -> LockError {
        self.inner.notifier.publish(&Notification {
            kind: EventKind::Error,
            singleton: self.name(),
            message: err.to_string(),
            error: Some(&err),
        });
        err
    }
}

fn retry_conflict_message(
    name: &str,
    expired: DateTime<Utc>,
    newer: Option<DateTime<Utc>>,
) -> String {
    let newer = newer
        .map(|c| format!(" (created {})", c.to_rfc3339()))
        .unwrap_or_default();
    format!(
        "An expired lock (created {}) for singleton '{}' was deleted, but when an attempt to create a new lock was made, another lock{} existed.",
        expired.to_rfc3339(),
        name,
        newer
    )
}

impl std::fmt::Debug for Singleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Singleton")
            .field("name", &self.inner.name)
            .field("options", &self.inner.options)
            .field("held", &self.is_held())
            .finish()
    }
}
