//! Durable catalogue of cached working copies.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/
//! ├── <key>/                 committed working copy
//! ├── .entries/<key>.json    CacheEntry record
//! ├── .staging/<key>-<id>/   fetch in progress
//! └── .locks/<key>.lock      cross-process lock
//! ```
//!
//! An entry is registered once its record exists and its storage directory is present.
//! [`CacheStore::put`] moves the storage in place before writing the record, and
//! [`CacheStore::remove`] deletes the record before the storage, so a crash at any point
//! leaves at worst an unregistered directory that [`CacheStore::recover`] reclaims.
//!
//! Mutations of one key are serialized within the process. The sweeps
//! ([`CacheStore::enforce_limits`], [`CacheStore::clear_all`], [`CacheStore::recover`])
//! additionally try the key's file lock and skip entries another resolve is working on.

use super::clock::{Clock, SystemClock};
use super::key_mutex::{KeyGuard, KeyedMutex};
use super::keying::{CacheKey, CanonicalLocation};
use super::lock::{CacheLock, cleanup_stale_locks};
use crate::constants::{ENTRIES_DIR, STAGING_DIR};
use crate::core::{FileOperation, FileOperationError, FileResultExt, IdxvizError};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Metadata record for one cached working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Absolute path of the working copy.
    pub storage_path: PathBuf,
    /// Canonical location the copy was fetched from.
    pub origin_identity: CanonicalLocation,
    /// When the copy was last (re)fetched. Drives TTL expiry.
    pub last_fetched_at: DateTime<Utc>,
    /// When the copy was last handed out. Drives LRU eviction.
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry is at most `ttl` old at `now`.
    ///
    /// An entry fetched "in the future" (clock skew) counts as fresh.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        now.signed_duration_since(self.last_fetched_at) <= ttl
    }
}

/// Outcome of one [`CacheStore::enforce_limits`] sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Entries removed because their TTL elapsed.
    pub expired: Vec<CacheKey>,
    /// Entries removed to get back under the entry limit, oldest access first.
    pub evicted: Vec<CacheKey>,
    /// Entries that could not be removed. Each is an [`IdxvizError::EvictionFailed`].
    pub failed: Vec<IdxvizError>,
}

impl EvictionReport {
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.expired.len() + self.evicted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.evicted.is_empty() && self.failed.is_empty()
    }
}

/// Counts returned by [`CacheStore::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub removed_count: usize,
    pub failed_count: usize,
}

/// What [`CacheStore::recover`] cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub staging_removed: usize,
    pub dangling_records_removed: usize,
    pub orphans_removed: usize,
    pub locks_removed: usize,
}

impl RecoveryReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.staging_removed + self.dangling_records_removed + self.orphans_removed + self.locks_removed
    }
}

enum Eviction {
    Removed,
    Missing,
    Busy,
    /// `registered` tells whether the record survived, so the entry still takes a slot.
    Failed { reason: String, registered: bool },
}

/// Persistent cache catalogue. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    key_locks: KeyedMutex,
}

impl CacheStore {
    /// Open (creating if necessary) the store rooted at `root`, using the system clock.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_clock(root, Arc::new(SystemClock)).await
    }

    /// Open the store with an explicit time source.
    pub async fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let root = root.into();
        for dir in [root.clone(), root.join(ENTRIES_DIR), root.join(STAGING_DIR)] {
            fs::create_dir_all(&dir)
                .await
                .with_file_context(FileOperation::CreateDir, &dir, "opening cache directory", "cache::store")?;
        }

        Ok(Self {
            root,
            clock,
            key_locks: KeyedMutex::new(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Where the working copy for `key` lives once committed.
    #[must_use]
    pub fn storage_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// A fresh, not yet existing staging directory for a fetch of `key`.
    #[must_use]
    pub fn staging_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(format!("{}-{}", key.as_str(), uuid::Uuid::new_v4().simple()))
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(ENTRIES_DIR).join(format!("{}.json", key.as_str()))
    }

    async fn lock_key(&self, key: &CacheKey) -> KeyGuard {
        self.key_locks.lock(key).await
    }

    /// Read the record for `key`, if it exists and parses.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.record_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FileOperationError::new(FileOperation::Read, &path, "reading cache entry", "cache::store", e).into());
            }
        };

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Whether `key` is registered: its record exists and its storage is present.
    pub async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.registered(key).await?.is_some())
    }

    async fn registered(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let Some(entry) = self.get(key).await? else {
            return Ok(None);
        };
        if fs::try_exists(&entry.storage_path).await.unwrap_or(false) {
            Ok(Some(entry))
        } else {
            debug!(target: "idxviz::store", "Cache entry {} has no storage", key.short());
            Ok(None)
        }
    }

    /// Whether `key` is registered and was fetched less than `ttl` ago.
    pub async fn is_fresh(&self, key: &CacheKey, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.registered(key).await?.is_some_and(|entry| entry.is_fresh(now, ttl)))
    }

    /// Mark `key` as used now. Returns `false` when it is not registered.
    pub async fn touch(&self, key: &CacheKey) -> Result<bool> {
        let _guard = self.lock_key(key).await;
        let Some(mut entry) = self.registered(key).await? else {
            return Ok(false);
        };
        entry.last_accessed_at = self.clock.now();
        self.write_record(&entry).await?;
        Ok(true)
    }

    /// Register the working copy at `storage` under `key`.
    ///
    /// `storage` is moved to [`CacheStore::storage_path`] unless it is already there.
    /// Any previous entry for the key is replaced. Both timestamps are set to now.
    pub async fn put(&self, key: &CacheKey, storage: &Path, origin: &CanonicalLocation) -> Result<CacheEntry> {
        let _guard = self.lock_key(key).await;
        let target = self.storage_path(key);

        if storage != target {
            self.remove_locked(key).await?;
            fs::rename(storage, &target).await.with_file_context(
                FileOperation::Rename,
                storage,
                "committing fetched repository",
                "cache::store",
            )?;
        }

        let now = self.clock.now();
        let entry = CacheEntry {
            key: key.clone(),
            storage_path: target,
            origin_identity: origin.clone(),
            last_fetched_at: now,
            last_accessed_at: now,
        };
        self.write_record(&entry).await?;
        debug!(target: "idxviz::store", "Registered cache entry {} for {}", key.short(), origin);
        Ok(entry)
    }

    /// Delete the record and storage of `key`. Idempotent; returns whether anything was removed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool> {
        let _guard = self.lock_key(key).await;
        self.remove_locked(key).await
    }

    async fn remove_locked(&self, key: &CacheKey) -> Result<bool> {
        let record = self.record_path(key);
        let storage = self.storage_path(key);
        let mut removed = false;

        match fs::remove_file(&record).await {
            Ok(()) => removed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FileOperationError::new(FileOperation::Remove, &record, "removing cache entry", "cache::store", e).into());
            }
        }

        if fs::try_exists(&storage).await.unwrap_or(false) {
            fs::remove_dir_all(&storage).await.with_file_context(
                FileOperation::Remove,
                &storage,
                "removing cached repository",
                "cache::store",
            )?;
            removed = true;
        }

        Ok(removed)
    }

    async fn write_record(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.record_path(&entry.key);
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        let json = serde_json::to_vec_pretty(entry).context("Failed to serialize cache entry")?;

        fs::write(&tmp, json)
            .await
            .with_file_context(FileOperation::Write, &tmp, "writing cache entry", "cache::store")?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(FileOperationError::new(FileOperation::Rename, &path, "committing cache entry", "cache::store", e).into());
        }
        Ok(())
    }

    /// All registered entries, least recently accessed first.
    pub async fn list_all(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for key in self.record_keys().await? {
            if let Some(entry) = self.registered(&key).await? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then(a.last_fetched_at.cmp(&b.last_fetched_at))
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(entries)
    }

    async fn record_keys(&self) -> Result<Vec<CacheKey>> {
        let dir = self.root.join(ENTRIES_DIR);
        let mut keys = Vec::new();
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => {
                return Err(FileOperationError::new(FileOperation::ReadDir, &dir, "listing cache entries", "cache::store", e).into());
            }
        };

        while let Some(item) = reader.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|s| s.to_str()).and_then(CacheKey::parse) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn evict(&self, key: &CacheKey) -> Eviction {
        let file_lock = match CacheLock::try_acquire(&self.root, key.as_str()).await {
            Ok(Some(lock)) => lock,
            Ok(None) => return Eviction::Busy,
            Err(e) => {
                return Eviction::Failed {
                    reason: format!("{e:#}"),
                    registered: true,
                };
            }
        };

        let _guard = self.lock_key(key).await;
        let result = self.remove_locked(key).await;
        drop(file_lock);

        match result {
            Ok(true) => Eviction::Removed,
            Ok(false) => Eviction::Missing,
            Err(e) => Eviction::Failed {
                reason: format!("{e:#}"),
                // Storage left behind after its record is gone is an orphan for recover
                registered: fs::try_exists(self.record_path(key)).await.unwrap_or(true),
            },
        }
    }

    /// Remove expired entries, then least recently used ones until at most `max_entries` remain.
    ///
    /// Entries held by a concurrent resolve and entries whose storage cannot be deleted are
    /// reported in [`EvictionReport::failed`] and skipped for the rest of the sweep.
    pub async fn enforce_limits(&self, ttl: Duration, max_entries: usize) -> Result<EvictionReport> {
        self.enforce_limits_sparing(ttl, max_entries, None).await
    }

    /// [`CacheStore::enforce_limits`], never evicting `keep`.
    ///
    /// Used by a resolve that holds the lock of `keep` and is about to hand it out.
    /// `keep` still counts towards `max_entries`.
    pub async fn enforce_limits_sparing(
        &self,
        ttl: Duration,
        max_entries: usize,
        keep: Option<&CacheKey>,
    ) -> Result<EvictionReport> {
        let now = self.clock.now();
        let mut report = EvictionReport::default();
        let mut live = Vec::new();
        // Entries left registered after a failed eviction still take up a slot
        let mut stuck = 0usize;

        for entry in self.list_all().await? {
            if entry.is_fresh(now, ttl) || keep == Some(&entry.key) {
                live.push(entry);
                continue;
            }
            match self.evict(&entry.key).await {
                Eviction::Removed => {
                    debug!(target: "idxviz::store", "Expired cache entry {} ({})", entry.key.short(), entry.origin_identity);
                    report.expired.push(entry.key);
                }
                Eviction::Missing => {}
                Eviction::Busy => {
                    stuck += 1;
                    report.failed.push(busy_error(&entry.key));
                }
                Eviction::Failed { reason, registered } => {
                    if registered {
                        stuck += 1;
                    }
                    report.failed.push(eviction_error(&entry.key, reason));
                }
            }
        }

        let mut remaining = live.len() + stuck;
        for entry in live {
            if remaining <= max_entries {
                break;
            }
            if keep == Some(&entry.key) {
                continue;
            }
            match self.evict(&entry.key).await {
                Eviction::Removed => {
                    debug!(target: "idxviz::store", "Evicted least recently used cache entry {} ({})", entry.key.short(), entry.origin_identity);
                    report.evicted.push(entry.key);
                    remaining -= 1;
                }
                Eviction::Missing => remaining -= 1,
                Eviction::Busy => report.failed.push(busy_error(&entry.key)),
                Eviction::Failed { reason, registered } => {
                    if !registered {
                        remaining -= 1;
                    }
                    report.failed.push(eviction_error(&entry.key, reason));
                }
            }
        }

        for failure in &report.failed {
            warn!("{failure}");
        }
        if report.removed_count() > 0 {
            info!(
                target: "idxviz::store",
                "Cache sweep removed {} expired and {} least recently used entries",
                report.expired.len(),
                report.evicted.len()
            );
        }
        Ok(report)
    }

    /// Remove every entry. Entries in use by a concurrent resolve are counted as failed.
    pub async fn clear_all(&self) -> Result<ClearSummary> {
        let mut summary = ClearSummary::default();
        for key in self.record_keys().await? {
            match self.evict(&key).await {
                Eviction::Removed => summary.removed_count += 1,
                Eviction::Missing => {}
                Eviction::Busy => {
                    warn!("{}", busy_error(&key));
                    summary.failed_count += 1;
                }
                Eviction::Failed { reason, .. } => {
                    warn!("{}", eviction_error(&key, reason));
                    summary.failed_count += 1;
                }
            }
        }

        // Directories that never got a record are not entries, but clearing should reclaim them
        let orphans = self.remove_orphan_storage().await?;
        if orphans > 0 {
            debug!(target: "idxviz::store", "Removed {orphans} unregistered cache directories");
        }
        Ok(summary)
    }

    /// Reclaim what an interrupted process left behind.
    ///
    /// Only work whose key lock is free is touched, so fetches running in other processes
    /// are left alone. Lock files unused for longer than `lock_age` are deleted.
    pub async fn recover(&self, lock_age: Duration) -> Result<RecoveryReport> {
        let mut report = RecoveryReport {
            staging_removed: self.remove_abandoned_staging().await?,
            ..RecoveryReport::default()
        };

        for key in self.record_keys().await? {
            let Some(entry) = self.get(&key).await? else {
                // Unparseable record: treat like a dangling one
                if self.remove_unused(&key, &self.record_path(&key), false).await {
                    report.dangling_records_removed += 1;
                }
                continue;
            };
            if !fs::try_exists(&entry.storage_path).await.unwrap_or(false)
                && self.remove_unused(&key, &self.record_path(&key), false).await
            {
                report.dangling_records_removed += 1;
            }
        }

        report.orphans_removed = self.remove_orphan_storage().await?;
        report.locks_removed = cleanup_stale_locks(&self.root, lock_age).await?;

        if report.total() > 0 {
            info!(
                target: "idxviz::store",
                "Recovered cache directory: {} staging, {} dangling records, {} orphaned copies, {} lock files removed",
                report.staging_removed, report.dangling_records_removed, report.orphans_removed, report.locks_removed
            );
        }
        Ok(report)
    }

    async fn remove_abandoned_staging(&self) -> Result<usize> {
        let dir = self.root.join(STAGING_DIR);
        let mut removed = 0;
        let Ok(mut reader) = fs::read_dir(&dir).await else {
            return Ok(0);
        };
        while let Some(item) = reader.next_entry().await? {
            let path = item.path();
            let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.get(..CacheKey::LEN))
                .and_then(CacheKey::parse)
            else {
                continue;
            };
            if self.remove_unused(&key, &path, true).await {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn remove_orphan_storage(&self) -> Result<usize> {
        let mut removed = 0;
        let mut reader = fs::read_dir(&self.root)
            .await
            .with_file_context(FileOperation::ReadDir, &self.root, "scanning cache directory", "cache::store")?;
        while let Some(item) = reader.next_entry().await? {
            let path = item.path();
            let Some(key) = path.file_name().and_then(|n| n.to_str()).and_then(CacheKey::parse) else {
                continue;
            };
            if !item.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            if fs::try_exists(self.record_path(&key)).await.unwrap_or(false) {
                continue;
            }
            if self.remove_unused(&key, &path, true).await {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete `path` if nobody holds the lock of `key`. Failures are logged.
    async fn remove_unused(&self, key: &CacheKey, path: &Path, is_dir: bool) -> bool {
        let Ok(Some(_file_lock)) = CacheLock::try_acquire(&self.root, key.as_str()).await else {
            return false;
        };
        let _guard = self.lock_key(key).await;
        let result = if is_dir {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn busy_error(key: &CacheKey) -> IdxvizError {
    eviction_error(key, "entry is in use by another operation".to_string())
}

fn eviction_error(key: &CacheKey, reason: String) -> IdxvizError {
    IdxvizError::EvictionFailed {
        key: key.to_string(),
        reason,
    }
}
