//! In-memory persister (for tests and single-process use).

use super::{LockRecord, PersistOutcome, Persister};
use crate::error::{LockError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory persister.
///
/// ## Limitations
/// - Not persistent (records lost on restart)
/// - Not distributed (contention only between controllers in this process)
///
/// Check-and-insert happens under one write guard, which makes
/// `persist_lock` atomic for every clone sharing the map.
#[derive(Clone, Default)]
pub struct MemoryPersister {
    records: Arc<RwLock<HashMap<String, LockRecord>>>,
}

impl MemoryPersister {
    /// Create an empty in-memory persister.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` directly, replacing any record with the same name.
    pub async fn insert_record(&self, record: LockRecord) {
        let mut records = self.records.write().await;
        records.insert(record.name.clone(), record);
    }

    /// Get the record for `name`, if present.
    pub async fn record(&self, name: &str) -> Option<LockRecord> {
        let records = self.records.read().await;
        records.get(name).cloned()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockError::InvalidName("name must not be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn persist_lock(&self, name: &str) -> Result<PersistOutcome> {
        require_name(name)?;
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(name) {
            return Ok(PersistOutcome::Conflict {
                created: Some(existing.created),
            });
        }

        records.insert(name.to_string(), LockRecord::new(name));
        Ok(PersistOutcome::Created)
    }

    async fn delete_lock(&self, name: &str) -> Result<()> {
        require_name(name)?;
        self.records.write().await.remove(name);
        Ok(())
    }

    async fn lock_exists(&self, name: &str) -> Result<bool> {
        require_name(name)?;
        Ok(self.records.read().await.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_persist_then_conflict() {
        let persister = MemoryPersister::new();

        assert_eq!(
            persister.persist_lock("jobs").await.unwrap(),
            PersistOutcome::Created
        );
        let created = persister.record("jobs").await.unwrap().created;

        assert_eq!(
            persister.persist_lock("jobs").await.unwrap(),
            PersistOutcome::Conflict {
                created: Some(created)
            }
        );
        assert_eq!(persister.len().await, 1);
    }

    #[tokio::test]
    async fn test_seeded_record_is_reported() {
        let persister = MemoryPersister::new();
        let created = Utc::now() - Duration::hours(1);
        persister
            .insert_record(LockRecord::created_at("jobs", created))
            .await;

        assert_eq!(
            persister.persist_lock("jobs").await.unwrap(),
            PersistOutcome::Conflict {
                created: Some(created)
            }
        );
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let persister = MemoryPersister::new();

        persister.persist_lock("jobs").await.unwrap();
        assert!(persister.lock_exists("jobs").await.unwrap());

        persister.delete_lock("jobs").await.unwrap();
        assert!(!persister.lock_exists("jobs").await.unwrap());
        assert!(persister.is_empty().await);

        // Idempotent
        persister.delete_lock("jobs").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let persister = MemoryPersister::new();
        let other = persister.clone();

        persister.persist_lock("jobs").await.unwrap();
        assert!(other.lock_exists("jobs").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_persists_have_one_winner() {
        let persister = MemoryPersister::new();
        let mut handles = Vec::new();

        for _ in 0..10 {
            let persister = persister.clone();
            handles.push(tokio::spawn(async move {
                persister.persist_lock("contended").await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == PersistOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let persister = MemoryPersister::new();
        let err = persister.persist_lock("").await.unwrap_err();
        assert!(matches!(err, LockError::InvalidName(_)));
    }
}
