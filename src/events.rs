//! Append-only event log for lock lifecycle notifications.
//!
//! Events are stored in NDJSON format (one JSON object per line) at the path
//! configured as `event_log`. Several processes may append to the same file;
//! each event is written with a single `write` call in append mode.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `event`: notification kind (`locking`, `locked`, `conflict`, ...)
//! - `singleton`: lock name
//! - `message`: human-readable description
//! - `error`: failure text, for `error` events only
//! - `actor`: the owner string (e.g., `user@HOST`)
//!
//! # Usage
//!
//! ```no_run
//! use singleton_lock::events::EventLog;
//! use singleton_lock::persister::MemoryPersister;
//! use singleton_lock::singleton::{LockOptions, Singleton};
//! use std::sync::Arc;
//!
//! let singleton = Singleton::new("nightly", Arc::new(MemoryPersister::new()), LockOptions::default())?;
//! EventLog::new(".singleton/events.ndjson").attach(&singleton);
//! # Ok::<(), singleton_lock::error::LockError>(())
//! ```

use crate::error::{LockError, Result};
use crate::notify::{EventKind, Notification, SubscriptionId};
use crate::persister::owner_string;
use crate::singleton::Singleton;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// When the notification was published.
    pub ts: DateTime<Utc>,

    /// Notification kind.
    pub event: EventKind,

    /// Lock name.
    pub singleton: String,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Who produced the event (e.g., `user@HOST`).
    pub actor: String,
}

impl EventRecord {
    /// Capture `notification` with the current time.
    pub fn from_notification(notification: &Notification<'_>, actor: &str) -> Self {
        Self {
            ts: Utc::now(),
            event: notification.kind,
            singleton: notification.singleton.to_string(),
            message: notification.message.clone(),
            error: notification.error.map(|e| e.to_string()),
            actor: actor.to_string(),
        }
    }

    /// Serialize to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// NDJSON event log file.
///
/// Notification handlers run synchronously inside acquire and release, so
/// the log keeps its file open after the first append and resolves the
/// actor once. Each event then costs one small blocking append. Clones
/// share the open file.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    actor: String,
    file: Arc<Mutex<Option<File>>>,
}

impl EventLog {
    /// Log at `path`, attributing events to the current `user@HOST`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_actor(path, owner_string())
    }

    pub fn with_actor(path: impl Into<PathBuf>, actor: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            actor: actor.into(),
            file: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Append `record` as one line, creating the file and its parent
    /// directory on first use.
    pub fn append(&self, record: &EventRecord) -> Result<()> {
        let mut line = record.to_ndjson_line()?;
        line.push('\n');

        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let file = match guard.take() {
            Some(file) => file,
            None => self.open()?,
        };
        let file = guard.insert(file);

        file.write_all(line.as_bytes()).map_err(|e| {
            LockError::Backend(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                LockError::Backend(format!(
                    "failed to create event log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LockError::Backend(format!(
                    "failed to open event log '{}': {}",
                    self.path.display(),
                    e
                ))
            })
    }

    /// Read every record in the log. A missing file is an empty log.
    pub fn read_all(&self) -> Result<Vec<EventRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(LockError::from))
            .collect()
    }

    /// Append every notification of `singleton` to this log.
    ///
    /// Write failures are logged and otherwise ignored: the event log never
    /// changes a lock operation's outcome.
    pub fn attach(&self, singleton: &Singleton) -> SubscriptionId {
        let log = self.clone();
        singleton.subscribe_all(move |n| {
            if let Err(err) = log.append(&EventRecord::from_notification(n, &log.actor)) {
                tracing::warn!(path = %log.path.display(), error = %err, "failed to append event");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persister::MemoryPersister;
    use crate::singleton::LockOptions;
    use serial_test::serial;
    use tempfile::TempDir;

    fn record(kind: EventKind) -> EventRecord {
        EventRecord {
            ts: Utc::now(),
            event: kind,
            singleton: "nightly".to_string(),
            message: format!("{} happened", kind),
            error: None,
            actor: "tester@host".to_string(),
        }
    }

    #[test]
    fn test_record_is_one_line() {
        let line = record(EventKind::Locked).to_ndjson_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"event\":\"locked\""));
        assert!(!line.contains("\"error\""));
    }

    #[test]
    fn test_append_creates_parent_and_appends() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::new(temp_dir.path().join("nested/events.ndjson"));

        log.append(&record(EventKind::Locking)).unwrap();
        log.append(&record(EventKind::Locked)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);

        let events: Vec<EventKind> = log.read_all().unwrap().iter().map(|r| r.event).collect();
        assert_eq!(events, vec![EventKind::Locking, EventKind::Locked]);
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::new(temp_dir.path().join("none.ndjson"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_records_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::new(temp_dir.path().join("events.ndjson"));
        let persister: Arc<MemoryPersister> = Arc::new(MemoryPersister::new());
        let first = Singleton::new("nightly", persister.clone(), LockOptions::default()).unwrap();
        let second = Singleton::new("nightly", persister, LockOptions::default()).unwrap();
        log.attach(&first);
        log.attach(&second);

        assert!(first.acquire().await.unwrap());
        assert!(!second.acquire().await.unwrap());
        first.release().await.unwrap();

        let records = log.read_all().unwrap();
        let events: Vec<EventKind> = records.iter().map(|r| r.event).collect();
        assert_eq!(
            events,
            vec![
                EventKind::Locking,
                EventKind::Locked,
                EventKind::Locking,
                EventKind::Conflict,
                EventKind::Releasing,
                EventKind::Released,
            ]
        );
        assert!(records.iter().all(|r| r.singleton == "nightly"));
        assert!(records.iter().all(|r| !r.actor.is_empty()));
    }

    #[test]
    fn test_error_text_is_kept() {
        let err = LockError::Backend("bad stuff".to_string());
        let record = EventRecord::from_notification(
            &Notification {
                kind: EventKind::Error,
                singleton: "nightly",
                message: err.to_string(),
                error: Some(&err),
            },
            "tester@host",
        );

        assert_eq!(record.error.as_deref(), Some("bad stuff"));
        assert_eq!(record.actor, "tester@host");
        let parsed: EventRecord = serde_json::from_str(&record.to_ndjson_line().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[tokio::test]
    async fn test_attach_uses_log_actor() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::with_actor(temp_dir.path().join("events.ndjson"), "ci@builder");
        let singleton =
            Singleton::new("nightly", Arc::new(MemoryPersister::new()), LockOptions::default())
                .unwrap();
        log.attach(&singleton);

        assert!(singleton.acquire().await.unwrap());

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.actor == "ci@builder"));
    }

    #[test]
    #[serial]
    fn test_new_resolves_owner_actor() {
        let log = EventLog::new("events.ndjson");
        assert_eq!(log.actor(), owner_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_opened_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.ndjson");
        let log = EventLog::new(&path);

        log.append(&record(EventKind::Locking)).unwrap();
        // Unlinking keeps the open handle valid; a reopen would recreate the path.
        std::fs::remove_file(&path).unwrap();
        log.clone().append(&record(EventKind::Locked)).unwrap();

        assert!(!path.exists());
    }
}
