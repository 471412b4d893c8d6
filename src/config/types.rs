//! Configuration types and defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend for lock records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// One file per lock in `lock_dir` (default).
    #[default]
    File,
    /// Process-local map; locks vanish when the process exits.
    Memory,
    /// Table in the SQLite database at `database_url`.
    Sqlite,
}

impl Backend {
    /// Parse a backend from its config name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "memory" => Some(Self::Memory),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::File => "file",
            Backend::Memory => "memory",
            Backend::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "singleton.yaml";

pub(crate) fn default_lock_dir() -> PathBuf {
    PathBuf::from(".singleton/locks")
}
