//! Command context resolution for `singleton`.
//!
//! Every command resolves the same way: load the config file, apply the
//! global CLI overrides, then anchor relative paths at the working
//! directory. The result knows how to build a fully wired controller.

use crate::cli::GlobalArgs;
use crate::config::{Backend, Config, DEFAULT_CONFIG_FILE};
use crate::error::{LockError, Result};
use crate::events::EventLog;
use crate::logging;
use crate::persister::Persister;
use crate::singleton::Singleton;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct LockContext {
    /// Directory relative paths are resolved against.
    pub cwd: PathBuf,

    /// Config file that was read, if any.
    pub config_path: Option<PathBuf>,

    /// Effective configuration (file plus CLI overrides).
    pub config: Config,
}

impl LockContext {
    /// Resolve the context from the current working directory.
    pub fn resolve(global: &GlobalArgs) -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            LockError::Config(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd, global)
    }

    /// Resolve the context from a specific directory.
    ///
    /// An explicit `--config` must exist; the default `singleton.yaml` is
    /// optional. The `memory` backend is rejected: each CLI invocation is its
    /// own process, so its locks would never be seen by anyone else.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P, global: &GlobalArgs) -> Result<Self> {
        let cwd = cwd.as_ref().to_path_buf();

        let (mut config, config_path) = match &global.config {
            Some(path) => {
                let path = cwd.join(path);
                (Config::load(&path)?, Some(path))
            }
            None => {
                let path = cwd.join(DEFAULT_CONFIG_FILE);
                let found = path.exists().then(|| path.clone());
                (Config::load_or_default(&path)?, found)
            }
        };

        if let Some(lock_dir) = &global.lock_dir {
            config.lock_dir = lock_dir.clone();
        }
        if let Some(expire) = global.expire {
            config.lock_expire_seconds = Some(expire);
        }

        config.lock_dir = cwd.join(&config.lock_dir);
        config.event_log = config.event_log.map(|p| cwd.join(p));
        config.validate()?;

        if config.backend == Backend::Memory {
            return Err(LockError::Config(
                "the memory backend is process-local and cannot be used from the CLI".to_string(),
            ));
        }

        tracing::debug!(
            backend = %config.backend,
            lock_dir = %config.lock_dir.display(),
            "resolved configuration"
        );

        Ok(Self {
            cwd,
            config_path,
            config,
        })
    }

    /// Open the configured backend.
    pub async fn persister(&self) -> Result<Arc<dyn Persister>> {
        self.config.open_persister().await
    }

    /// Build a controller for `name` with logging and the event log attached.
    pub async fn singleton(&self, name: &str) -> Result<Singleton> {
        let persister = self.persister().await?;
        let singleton = Singleton::new(name, persister, self.config.lock_options())?;

        logging::attach(&singleton);
        if let Some(path) = &self.config.event_log {
            EventLog::new(path).attach(&singleton);
        }
        Ok(singleton)
    }
}
