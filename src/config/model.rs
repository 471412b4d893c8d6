//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the `singleton` tool.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where lock records live.
    pub backend: Backend,

    /// Directory of lock files for the `file` backend.
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,

    /// SQLite URL for the `sqlite` backend (e.g. `sqlite://locks.db`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Seconds after which a conflicting lock is replaced. Unset disables
    /// expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_expire_seconds: Option<u64>,

    /// NDJSON file receiving every lock notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            lock_dir: default_lock_dir(),
            database_url: None,
            lock_expire_seconds: None,
            event_log: None,
        }
    }
}
