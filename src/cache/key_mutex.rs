//! In-process mutual exclusion per cache key.
//!
//! Each key gets its own async mutex, created on first use. A map entry lives only while
//! some task holds or waits for that key's mutex, so the map never grows past the number of
//! keys in use at once.

use super::keying::CacheKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of async mutexes keyed by [`CacheKey`]. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyedMutex {
    locks: Arc<DashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`. Released when the guard is dropped.
    pub(crate) async fn lock(&self, key: &CacheKey) -> KeyGuard {
        // Cloning under the shard lock means a concurrent release sees the extra reference
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
            key: key.clone(),
        }
    }

    /// Number of keys currently held or waited on.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive use of one key. Dropping it unlocks and forgets the key when nobody else wants it.
#[derive(Debug)]
pub(crate) struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<CacheKey, Arc<Mutex<()>>>>,
    key: CacheKey,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // The guard holds a reference to the mutex, so release it before counting
        drop(self.guard.take());
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
