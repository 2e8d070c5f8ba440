//! Resolution of repository locations to local working copies.
//!
//! [`RepositoryCacheManager::resolve`] is the one entry point the rest of idxviz uses to
//! get a repository on disk. It reuses a fresh cached copy when the copy still points at
//! the requested remote, and fetches a new one otherwise. Size and TTL limits are enforced
//! after every fetch.
//!
//! Work on one key is serialized twice: by an in-process mutex, so tasks of this process
//! queue without polling, and by the key's [`CacheLock`], so other processes sharing the
//! cache directory wait too. The lock is held until the entry is committed and the limit
//! sweep has run. That sweep spares the copy about to be returned.
//!
//! Each resolution runs in its own task. A caller that stops waiting for the result does
//! not interrupt a fetch half way; it completes (or cleans up after itself) in the
//! background.

use super::clock::{Clock, SystemClock};
use super::key_mutex::KeyedMutex;
use super::keying::{CacheKey, CanonicalLocation, canonicalize, key_for};
use super::lock::CacheLock;
use super::store::{CacheEntry, CacheStore, ClearSummary, EvictionReport};
use crate::constants::{DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_CACHED_ENTRIES, DEFAULT_TTL_SECONDS};
use crate::core::IdxvizError;
use crate::git::SourceControl;
use crate::index::IndexDecoder;
use crate::tree::{TreeBuilder, TreeNode};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Limits and location of the repository cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub cache_dir: PathBuf,
    /// How long a fetched copy is reused before it is fetched again.
    pub ttl: Duration,
    /// Upper bound on the number of cached copies. At least 1.
    pub max_entries: usize,
    /// How long to wait for another process working on the same repository.
    pub lock_timeout: Duration,
}

impl CacheSettings {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            max_entries: DEFAULT_MAX_CACHED_ENTRIES,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), IdxvizError> {
        if self.max_entries == 0 {
            return Err(IdxvizError::ConfigError {
                message: "max_cached_entries must be at least 1".to_string(),
            });
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(IdxvizError::ConfigError {
                message: "cache directory must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// A repository made available on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRepository {
    pub location: CanonicalLocation,
    pub key: CacheKey,
    pub local_path: PathBuf,
    /// `true` when an existing copy was reused, `false` after a fresh fetch.
    pub used_cache: bool,
}

/// Owns the cache directory and hands out working copies. Cheap to clone.
#[derive(Clone)]
pub struct RepositoryCacheManager {
    store: CacheStore,
    client: Arc<dyn SourceControl>,
    settings: CacheSettings,
    resolve_locks: KeyedMutex,
}

impl std::fmt::Debug for RepositoryCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryCacheManager")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl RepositoryCacheManager {
    /// Open the cache described by `settings`.
    ///
    /// Leftovers of interrupted runs are cleaned up and the limits are enforced once, so a
    /// cache written with a larger limit shrinks on first use.
    pub async fn open(settings: CacheSettings, client: Arc<dyn SourceControl>) -> Result<Self> {
        Self::open_with_clock(settings, client, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        settings: CacheSettings,
        client: Arc<dyn SourceControl>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;
        let store = CacheStore::with_clock(&settings.cache_dir, clock)
            .await
            .with_context(|| format!("Failed to open cache at {}", settings.cache_dir.display()))?;

        if let Err(e) = store.recover(settings.ttl).await {
            warn!("Cache recovery incomplete: {e:#}");
        }
        if let Err(e) = store.enforce_limits(settings.ttl, settings.max_entries).await {
            warn!("Failed to enforce cache limits: {e:#}");
        }

        Ok(Self {
            store,
            client,
            settings,
            resolve_locks: KeyedMutex::new(),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.store.root()
    }

    /// Make `location` available locally and return where it is.
    ///
    /// # Errors
    ///
    /// - [`IdxvizError::CanonicalizationError`] for an unusable location
    /// - [`IdxvizError::FetchError`] when the repository cannot be cloned
    pub async fn resolve(&self, location: &str) -> Result<ResolvedRepository> {
        let location = canonicalize(location)?;
        let key = key_for(&location);

        let this = self.clone();
        tokio::spawn(async move { this.resolve_canonical(location, key).await })
            .await
            .context("Repository resolution task failed")?
    }

    async fn resolve_canonical(&self, location: CanonicalLocation, key: CacheKey) -> Result<ResolvedRepository> {
        let _guard = self.resolve_locks.lock(&key).await;
        let _file_lock = CacheLock::acquire_with_timeout(self.store.root(), key.as_str(), self.settings.lock_timeout)
            .await
            .with_context(|| format!("Failed to lock cache entry for {location}"))?;

        if let Some(resolved) = self.try_reuse(&location, &key).await? {
            return Ok(resolved);
        }
        self.fetch_fresh(&location, &key).await
    }

    /// Reuse the cached copy if it is fresh and still points at `location`.
    /// Anything registered but unusable is removed.
    async fn try_reuse(&self, location: &CanonicalLocation, key: &CacheKey) -> Result<Option<ResolvedRepository>> {
        if !self.store.exists(key).await? {
            return Ok(None);
        }

        if self.store.is_fresh(key, self.settings.ttl).await? {
            let storage = self.store.storage_path(key);
            match self.verify_identity(location, &storage).await {
                Ok(()) => {
                    self.store.touch(key).await?;
                    debug!(target: "idxviz::cache", "Using cached copy {} for {}", key.short(), location);
                    return Ok(Some(ResolvedRepository {
                        location: location.clone(),
                        key: key.clone(),
                        local_path: storage,
                        used_cache: true,
                    }));
                }
                Err(mismatch) => warn!("{mismatch}; fetching again"),
            }
        } else {
            debug!(target: "idxviz::cache", "Cached copy {} of {} has expired", key.short(), location);
        }

        self.store.remove(key).await?;
        Ok(None)
    }

    async fn verify_identity(&self, location: &CanonicalLocation, storage: &Path) -> Result<(), IdxvizError> {
        let found = match self.client.open(storage).await {
            Ok(identity) => identity,
            Err(e) => {
                return Err(IdxvizError::CacheMismatch {
                    expected: location.to_string(),
                    found: format!("<unreadable: {e}>"),
                });
            }
        };

        match canonicalize(&found) {
            Ok(recorded) if &recorded == location => Ok(()),
            _ => Err(IdxvizError::CacheMismatch {
                expected: location.to_string(),
                found,
            }),
        }
    }

    async fn fetch_fresh(&self, location: &CanonicalLocation, key: &CacheKey) -> Result<ResolvedRepository> {
        let staging = self.store.staging_path(key);
        info!(target: "idxviz::cache", "Fetching {location}");

        if let Err(e) = self.client.fetch(location, &staging).await {
            discard_staging(&staging).await;
            return Err(IdxvizError::FetchError {
                location: location.to_string(),
                reason: format!("{e:#}"),
            }
            .into());
        }

        let entry = match self.store.put(key, &staging, location).await {
            Ok(entry) => entry,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };

        match self
            .store
            .enforce_limits_sparing(self.settings.ttl, self.settings.max_entries, Some(key))
            .await
        {
            Ok(report) if report.removed_count() > 0 => {
                debug!(target: "idxviz::cache", "Made room in cache: {} entries removed", report.removed_count());
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to enforce cache limits: {e:#}"),
        }

        Ok(ResolvedRepository {
            location: location.clone(),
            key: key.clone(),
            local_path: entry.storage_path,
            used_cache: false,
        })
    }

    /// Resolve `location` and build its file tree from the working copy's index.
    pub async fn load_tree(
        &self,
        location: &str,
        decoder: Arc<dyn IndexDecoder>,
    ) -> Result<(ResolvedRepository, TreeNode)> {
        let resolved = self.resolve(location).await?;
        let index_path = resolved.local_path.join(".git").join("index");
        let root_name = resolved.location.repository_name().to_string();

        let tree = tokio::task::spawn_blocking(move || -> Result<TreeNode> {
            let entries = decoder.decode(&index_path)?;
            debug!(target: "idxviz::cache", "Decoded {} index entries from {}", entries.len(), index_path.display());
            Ok(TreeBuilder::new(root_name).build(&entries)?)
        })
        .await
        .context("Tree building task failed")??;

        Ok((resolved, tree))
    }

    /// Resolve `location` and list the paths its working copy tracks.
    pub async fn list_tracked_paths(&self, location: &str) -> Result<(ResolvedRepository, Vec<String>)> {
        let resolved = self.resolve(location).await?;
        let paths = self.client.list_tracked_paths(&resolved.local_path).await?;
        Ok((resolved, paths))
    }

    /// Registered entries, least recently used first.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        self.store.list_all().await
    }

    /// Run the TTL and size sweep now.
    pub async fn prune(&self) -> Result<EvictionReport> {
        self.store.enforce_limits(self.settings.ttl, self.settings.max_entries).await
    }

    /// Remove every cached copy.
    pub async fn clear_all(&self) -> Result<ClearSummary> {
        let summary = self.store.clear_all().await?;
        info!(target: "idxviz::cache", "Cleared cache: {} removed, {} failed", summary.removed_count, summary.failed_count);
        Ok(summary)
    }
}

async fn discard_staging(staging: &Path) {
    if tokio::fs::try_exists(staging).await.unwrap_or(false)
        && let Err(e) = tokio::fs::remove_dir_all(staging).await
    {
        warn!("Failed to remove staging directory {}: {}", staging.display(), e);
    }
}
