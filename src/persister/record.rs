//! Lock record structures and utilities.

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The persisted marker of exclusive ownership for a name.
///
/// Records are never updated in place; a lock is replaced only by
/// delete-then-recreate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    /// The lock name (unique key).
    pub name: String,

    /// Timestamp when the record was written.
    pub created: DateTime<Utc>,

    /// Owner of the lock (e.g., `user@HOST`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Process ID of the lock holder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl LockRecord {
    /// Create a record for `name` stamped with the current time.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created: Utc::now(),
            owner: Some(owner_string()),
            pid: Some(std::process::id()),
        }
    }

    /// Create a record with an explicit creation time and no owner details.
    pub fn created_at(name: &str, created: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            created,
            owner: None,
            pid: None,
        }
    }

    /// Parse a record from its JSON form.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Age of the record relative to now.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created)
    }
}

/// Get the owner string for lock records.
pub(crate) fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_new_record_is_fresh_and_owned() {
        let record = LockRecord::new("nightly-report");

        assert_eq!(record.name, "nightly-report");
        assert_eq!(record.pid, Some(std::process::id()));
        assert!(record.owner.as_deref().unwrap().contains('@'));
        assert!(record.age().num_seconds() < 5);
    }

    #[test]
    fn test_json_keeps_created_timestamp() {
        let created = Utc::now() - Duration::hours(1);
        let record = LockRecord::created_at("foo", created);

        let json = record.to_json().unwrap();
        assert!(json.contains("\"created\""));
        assert!(!json.contains("owner"));

        let parsed = LockRecord::from_json(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_garbage_is_a_record_error() {
        let err = LockRecord::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::LockError::Record(_)));
    }

    #[test]
    #[serial]
    fn test_owner_string_uses_user_env() {
        let previous = std::env::var("USER").ok();
        // SAFETY: serialized with other env-touching tests.
        unsafe { std::env::set_var("USER", "scheduler") };

        let owner = owner_string();
        assert!(owner.starts_with("scheduler@"));

        match previous {
            Some(value) => unsafe { std::env::set_var("USER", value) },
            None => unsafe { std::env::remove_var("USER") },
        }
    }
}
