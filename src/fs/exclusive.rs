//! Exclusive, atomic file publication.
//!
//! # Implementation Strategy
//!
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Hard-link the temporary file to the target name
//! 4. Remove the temporary name
//!
//! `link(2)` fails with `EEXIST` when the target exists and never replaces
//! it, so exactly one of any number of concurrent publishers wins, and the
//! winner's file is complete from the moment its name appears.
//!
//! # Important Notes
//!
//! - The directory must live on a filesystem that supports hard links
//! - On crash between steps 1 and 4 a temporary file may remain
//!   (named `.{filename}.{pid}.{nanos}.{seq}.tmp`); it never shadows a lock

use crate::error::{LockError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Publish `content` at `path` unless a file already exists there.
///
/// # Returns
///
/// * `Ok(true)` - The file was published
/// * `Ok(false)` - A file already existed at `path`; it was left untouched
/// * `Err(LockError::Backend)` - Any other filesystem failure
pub async fn publish_new(path: &Path, content: &[u8]) -> Result<bool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await.map_err(|e| {
            LockError::Backend(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content).await?;

    let linked = fs::hard_link(&temp_path, path).await;
    let _ = fs::remove_file(&temp_path).await;

    match linked {
        Ok(()) => {
            sync_parent(path).await;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(LockError::Backend(format!(
            "failed to publish '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Generate a temporary file path in the same directory as the target.
///
/// The pid, clock and counter suffix keep concurrent publishers (in this
/// process or others) from sharing a temporary file.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockError::Backend(format!("invalid file path '{}'", target.display())))?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);

    let temp_name = format!(
        ".{}.{}.{}.{}.tmp",
        filename,
        std::process::id(),
        nanos,
        seq
    );
    Ok(parent.join(temp_name))
}

/// Write content to a new file and sync to disk.
async fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| {
            LockError::Backend(format!(
                "failed to create temporary file '{}': {}",
                path.display(),
                e
            ))
        })?;

    if let Err(e) = file.write_all(content).await {
        let _ = fs::remove_file(path).await;
        return Err(LockError::Backend(format!(
            "failed to write temporary file '{}': {}",
            path.display(),
            e
        )));
    }

    if let Err(e) = file.sync_all().await {
        let _ = fs::remove_file(path).await;
        return Err(LockError::Backend(format!(
            "failed to sync temporary file '{}': {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

/// Best-effort sync of the parent directory so the new entry is durable.
async fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent).await
    {
        let _ = dir.sync_all().await;
    }
}
