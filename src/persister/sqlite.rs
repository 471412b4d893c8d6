//! SQLite-backed persister.
//!
//! All lock names share a single table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS singleton_locks (
//!   name TEXT PRIMARY KEY,
//!   created INTEGER NOT NULL,
//!   owner TEXT,
//!   pid INTEGER
//! );
//! ```
//!
//! - `created` is stored as UNIX epoch milliseconds
//! - the primary key is the uniqueness constraint the protocol relies on;
//!   an insert that violates it is a conflict, not an error

use super::{LockRecord, PersistOutcome, Persister};
use crate::error::{LockError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::instrument;

/// SQLite persister.
#[derive(Clone)]
pub struct SqlitePersister {
    pool: SqlitePool,
}

impl SqlitePersister {
    /// Connect to `database_url` and create the schema if needed.
    ///
    /// `database_url` is any valid `sqlx` SQLite URL, e.g.:
    /// - `sqlite://locks.db` (created if missing)
    /// - `sqlite::memory:` (see [`SqlitePersister::memory`])
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LockError::Backend(format!("invalid SQLite url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| LockError::Backend(format!("failed to connect SQLite: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database.
    ///
    /// Each SQLite connection to `:memory:` is its own database, so the pool
    /// is pinned to a single connection.
    pub async fn memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Use an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS singleton_locks (
              name TEXT PRIMARY KEY,
              created INTEGER NOT NULL,
              owner TEXT,
              pid INTEGER
            );
        "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| LockError::Backend(format!("failed to create singleton_locks table: {e}")))?;

        Ok(Self { pool })
    }

    async fn fetch_created(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> =
            sqlx::query_scalar(r#"SELECT created FROM singleton_locks WHERE name = ?1"#)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        millis
            .map(|ms| {
                DateTime::<Utc>::from_timestamp_millis(ms)
                    .ok_or_else(|| LockError::Record(format!("invalid created timestamp {ms}")))
            })
            .transpose()
    }
}

#[async_trait]
impl Persister for SqlitePersister {
    #[instrument(skip(self))]
    async fn persist_lock(&self, name: &str) -> Result<PersistOutcome> {
        if name.is_empty() {
            return Err(LockError::InvalidName("name must not be empty".to_string()));
        }
        let record = LockRecord::new(name);

        let inserted = sqlx::query(
            r#"INSERT INTO singleton_locks (name, created, owner, pid)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(&record.name)
        .bind(record.created.timestamp_millis())
        .bind(record.owner.as_deref())
        .bind(record.pid.map(i64::from))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(PersistOutcome::Created),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let created = self.fetch_created(name).await?;
                Ok(PersistOutcome::Conflict { created })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete_lock(&self, name: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM singleton_locks WHERE name = ?1"#)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn lock_exists(&self, name: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM singleton_locks WHERE name = ?1)"#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }
}
