//! Config loading, validation, and backend construction.

use super::model::Config;
use super::types::Backend;
use crate::error::{LockError, Result};
use crate::persister::{FilePersister, MemoryPersister, Persister};
use crate::singleton::LockOptions;
use std::path::Path;
use std::sync::Arc;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(LockError::Config)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, or use defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `lock_expire_seconds` must be positive when present
    /// - the `sqlite` backend requires `database_url`
    /// - the `file` backend requires a non-empty `lock_dir`
    pub fn validate(&self) -> Result<()> {
        if self.lock_expire_seconds == Some(0) {
            return Err(LockError::Config(
                "config validation failed: lock_expire_seconds must be greater than 0".to_string(),
            ));
        }

        match self.backend {
            Backend::Sqlite if self.database_url.as_deref().is_none_or(str::is_empty) => {
                Err(LockError::Config(
                    "config validation failed: the sqlite backend requires database_url"
                        .to_string(),
                ))
            }
            Backend::File if self.lock_dir.as_os_str().is_empty() => Err(LockError::Config(
                "config validation failed: lock_dir must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Controller options derived from this config.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            lock_expire_seconds: self.lock_expire_seconds,
        }
    }

    /// Build the configured persister.
    pub async fn open_persister(&self) -> Result<Arc<dyn Persister>> {
        self.validate()?;

        match self.backend {
            Backend::File => Ok(Arc::new(FilePersister::new(&self.lock_dir))),
            Backend::Memory => Ok(Arc::new(MemoryPersister::new())),
            Backend::Sqlite => self.open_sqlite().await,
        }
    }

    #[cfg(feature = "sqlite")]
    async fn open_sqlite(&self) -> Result<Arc<dyn Persister>> {
        let url = self.database_url.as_deref().unwrap_or_default();
        let persister = crate::persister::SqlitePersister::connect(url).await?;
        Ok(Arc::new(persister))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open_sqlite(&self) -> Result<Arc<dyn Persister>> {
        Err(LockError::Config(
            "the sqlite backend is not available in this build (enable the 'sqlite' feature)"
                .to_string(),
        ))
    }
}
