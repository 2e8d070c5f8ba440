//! File locking for cache entries.
//!
//! One lock file per cache key under `{cache_dir}/.locks/{key}.lock` serializes work on
//! that key across processes. The lock is released when the [`CacheLock`] is dropped.
//! Lock files are kept after release so that a waiter never ends up locking an unlinked
//! inode; [`cleanup_stale_locks`] removes old ones that nobody holds.

use crate::constants::{LOCKS_DIR, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

/// An exclusive OS-level lock on one cache key.
#[derive(Debug)]
pub struct CacheLock {
    file: Arc<File>,
    path: PathBuf,
}

impl CacheLock {
    /// Block until the lock for `name` is acquired.
    ///
    /// The blocking `flock`-style call runs on the blocking thread pool so the runtime's
    /// worker threads stay free.
    pub async fn acquire(cache_dir: &Path, name: &str) -> Result<Self> {
        let (file, path) = open_lock_file(cache_dir, name).await?;

        let file_clone = Arc::clone(&file);
        let name_owned = name.to_string();
        tokio::task::spawn_blocking(move || {
            file_clone
                .lock_exclusive()
                .with_context(|| format!("Failed to acquire lock for: {name_owned}"))
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        debug!(target: "idxviz::lock", lock = %path.display(), "Cache lock acquired");
        Ok(Self { file, path })
    }

    /// Acquire the lock, polling with exponential backoff until `timeout` expires.
    pub async fn acquire_with_timeout(cache_dir: &Path, name: &str, timeout: Duration) -> Result<Self> {
        let (file, path) = open_lock_file(cache_dir, name).await?;
        let start = Instant::now();

        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            if try_lock(&file).await? {
                debug!(
                    target: "idxviz::lock",
                    lock = %path.display(),
                    wait_ms = start.elapsed().as_millis(),
                    "Cache lock acquired"
                );
                return Ok(Self { file, path });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(anyhow::anyhow!("Timeout acquiring cache lock '{name}' after {timeout:?}"))
    }

    /// Acquire the lock only if nobody else holds it.
    ///
    /// Returns `Ok(None)` when the lock is currently held, including by another
    /// handle in this same process.
    pub async fn try_acquire(cache_dir: &Path, name: &str) -> Result<Option<Self>> {
        let (file, path) = open_lock_file(cache_dir, name).await?;
        if try_lock(&file).await? {
            Ok(Some(Self { file, path }))
        } else {
            Ok(None)
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Unlock explicitly: a clone of the Arc may still be alive in a blocking task
        if let Err(e) = FileExt::unlock(self.file.as_ref()) {
            debug!(target: "idxviz::lock", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

async fn open_lock_file(cache_dir: &Path, name: &str) -> Result<(Arc<File>, PathBuf)> {
    let locks_dir = cache_dir.join(LOCKS_DIR);
    tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            anyhow::anyhow!("Permission denied: cannot create locks directory at {}", locks_dir.display())
        } else {
            anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
        }
    })?;

    let lock_path = locks_dir.join(format!("{name}.lock"));
    let lock_path_clone = lock_path.clone();
    let file = tokio::task::spawn_blocking(move || {
        OpenOptions::new().create(true).write(true).truncate(false).open(&lock_path_clone)
    })
    .await
    .context("spawn_blocking panicked")?
    .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    Ok((Arc::new(file), lock_path))
}

async fn try_lock(file: &Arc<File>) -> Result<bool> {
    let file_clone = Arc::clone(file);
    let result = tokio::task::spawn_blocking(move || FileExt::try_lock_exclusive(file_clone.as_ref()))
        .await
        .context("spawn_blocking panicked")?;

    match result {
        Ok(acquired) => Ok(acquired),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e).context("Failed to poll cache lock"),
    }
}

/// Remove lock files older than `max_age` that nobody currently holds.
///
/// Returns the number of lock files removed.
pub async fn cleanup_stale_locks(cache_dir: &Path, max_age: Duration) -> Result<usize> {
    let locks_dir = cache_dir.join(LOCKS_DIR);
    if !tokio::fs::try_exists(&locks_dir).await.unwrap_or(false) {
        return Ok(0);
    }

    let mut removed_count = 0;
    let now = SystemTime::now();

    let mut entries = tokio::fs::read_dir(&locks_dir)
        .await
        .context("Failed to read locks directory")?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("lock") {
            continue;
        }

        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        let is_stale = now.duration_since(modified).is_ok_and(|age| age > max_age);
        if !is_stale {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        // Holding the lock while unlinking guarantees no one is using this file
        if let Some(lock) = CacheLock::try_acquire(cache_dir, &name).await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                removed_count += 1;
            }
            drop(lock);
        }
    }

    Ok(removed_count)
}
