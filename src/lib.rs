//! Singleton: process-level mutual exclusion over a shared, persisted store.
//!
//! A [`Singleton`] controller guards one named resource. Acquisition goes
//! through a pluggable [`Persister`] whose atomic create-if-absent is the
//! only source of exclusion; stale locks can be replaced once they are
//! older than a configured age. Every lifecycle step is published to
//! subscribers and also returned to the caller.
//!
//! ```no_run
//! use singleton_lock::persister::FilePersister;
//! use singleton_lock::singleton::{LockOptions, Singleton};
//! use std::sync::Arc;
//!
//! # async fn demo() -> singleton_lock::error::Result<()> {
//! let persister = Arc::new(FilePersister::new("/var/lock/myapp"));
//! let singleton = Singleton::new("nightly-report", persister, LockOptions::expiring_after(3600))?;
//!
//! if singleton.acquire().await? {
//!     // ... exclusive work ...
//!     singleton.release().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod logging;
pub mod notify;
pub mod persister;
pub mod shutdown;
pub mod singleton;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{LockError, Result};
pub use notify::{EventKind, Notification, Notifier, SubscriptionId};
pub use persister::{PersistOutcome, Persister};
pub use shutdown::ShutdownRegistry;
pub use singleton::{LockOptions, Singleton};
