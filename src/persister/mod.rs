//! Storage contract for singleton locks.
//!
//! A persister maps a lock name to three operations: create-if-absent,
//! delete, and existence check. The controller performs no locking of its
//! own; mutual exclusion rests entirely on `persist_lock` being atomic with
//! respect to every other `persist_lock` call sharing the same backend.
//!
//! # Backends
//!
//! - **File**: one JSON record per name in a shared directory, published
//!   with an exclusive hard link (always available)
//! - **Memory**: HashMap guarded by a tokio `RwLock` (single process)
//! - **SQLite**: one row per name, uniqueness from the primary key
//!   (feature: `sqlite`)

pub mod file;
pub mod memory;
mod record;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use file::FilePersister;
pub use memory::MemoryPersister;
pub use record::LockRecord;
pub(crate) use record::owner_string;

#[cfg(feature = "sqlite")]
pub use sqlite::SqlitePersister;

/// Outcome of a create-if-absent attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The record was inserted; the caller now holds the lock.
    Created,
    /// A record with this name already existed.
    ///
    /// `created` is the existing record's creation time, or `None` when the
    /// record vanished before it could be read back.
    Conflict { created: Option<DateTime<Utc>> },
}

/// Backend operations the lock controller depends on.
///
/// ## Contract
/// - `persist_lock`: atomically insert a record keyed by `name`. A
///   uniqueness violation is `Ok(Conflict { .. })`, never an error; the
///   existing record's creation time is read back on a best-effort basis.
///   Any other failure is an error.
/// - `delete_lock`: remove the record if present. Removing a missing record
///   succeeds.
/// - `lock_exists`: report existence without side effects.
#[async_trait]
pub trait Persister: Send + Sync {
    /// Atomically create the record for `name` unless one exists.
    async fn persist_lock(&self, name: &str) -> Result<PersistOutcome>;

    /// Remove the record for `name` (idempotent).
    async fn delete_lock(&self, name: &str) -> Result<()>;

    /// Report whether a record for `name` currently exists.
    async fn lock_exists(&self, name: &str) -> Result<bool>;
}

#[async_trait]
impl<P: Persister + ?Sized> Persister for Arc<P> {
    async fn persist_lock(&self, name: &str) -> Result<PersistOutcome> {
        (**self).persist_lock(name).await
    }

    async fn delete_lock(&self, name: &str) -> Result<()> {
        (**self).delete_lock(name).await
    }

    async fn lock_exists(&self, name: &str) -> Result<bool> {
        (**self).lock_exists(name).await
    }
}
