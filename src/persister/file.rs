//! Filesystem-backed persister.
//!
//! Records are stored as `<dir>/<name>.lock` with a JSON body. Every process
//! pointing at the same directory contends for the same records.

use super::{LockRecord, PersistOutcome, Persister};
use crate::error::{LockError, Result};
use crate::fs::publish_new;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// File extension of lock records.
pub const LOCK_EXTENSION: &str = "lock";

/// Persister that keeps one file per lock name in a shared directory.
///
/// Uniqueness comes from [`publish_new`]: a record is written in full under
/// a temporary name and hard-linked into place, which fails atomically when
/// the name is taken.
#[derive(Debug, Clone)]
pub struct FilePersister {
    dir: PathBuf,
}

impl FilePersister {
    /// Create a persister rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the lock records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `name`.
    pub fn lock_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, LOCK_EXTENSION)))
    }

    /// Read the record for `name`, if present.
    pub async fn read_record(&self, name: &str) -> Result<Option<LockRecord>> {
        let path = self.lock_path(name)?;
        match fs::read_to_string(&path).await {
            Ok(content) => LockRecord::from_json(&content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockError::Backend(format!(
                "failed to read lock file '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    /// Creation time of the record occupying `path`.
    ///
    /// A record that vanished is `None`. A record whose body can't be parsed
    /// falls back to the file's modification time so it can still expire.
    async fn conflict_created(&self, path: &Path) -> Result<Option<DateTime<Utc>>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LockError::Backend(format!(
                    "failed to read lock file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        match LockRecord::from_json(&content) {
            Ok(record) => Ok(Some(record.created)),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "unreadable lock record, using file modification time"
                );
                match fs::metadata(path).await {
                    Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

#[async_trait]
impl Persister for FilePersister {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn persist_lock(&self, name: &str) -> Result<PersistOutcome> {
        let path = self.lock_path(name)?;
        let json = LockRecord::new(name).to_json()?;

        if publish_new(&path, json.as_bytes()).await? {
            return Ok(PersistOutcome::Created);
        }

        let created = self.conflict_created(&path).await?;
        Ok(PersistOutcome::Conflict { created })
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn delete_lock(&self, name: &str) -> Result<()> {
        let path = self.lock_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::Backend(format!(
                "failed to delete lock file '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn lock_exists(&self, name: &str) -> Result<bool> {
        let path = self.lock_path(name)?;
        fs::try_exists(&path).await.map_err(|e| {
            LockError::Backend(format!(
                "failed to check lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Check that `name` maps to exactly one file name.
///
/// Allowed: ASCII letters, digits, `.`, `_`, `-`; must not start with `.`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockError::InvalidName("name must not be empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(LockError::InvalidName(format!(
            "'{}' must not start with '.'",
            name
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(LockError::InvalidName(format!(
            "'{}' contains unsupported character '{}'",
            name, c
        )));
    }
    Ok(())
}
