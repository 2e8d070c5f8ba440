//! Local cache of repository working copies.
//!
//! Remote repositories are cloned once and reused until their TTL runs out. The cache
//! keeps at most a configured number of copies and evicts the least recently used first.
//!
//! - [`keying`] turns a location string into a [`CanonicalLocation`] and a [`CacheKey`]
//! - [`store`] is the on-disk catalogue ([`CacheStore`])
//! - [`manager`] resolves locations to working copies ([`RepositoryCacheManager`])
//! - [`lock`] provides the cross-process per-key [`CacheLock`]
//! - [`clock`] abstracts time so expiry can be tested
//!
//! # Cache Location
//!
//! - **Default**: `~/.idxviz/cache/`
//! - **Environment override**: `IDXVIZ_CACHE_DIR`
//! - **Config file**: `cache_dir` in `~/.idxviz/config.toml`
//!
//! # Example
//!
//! ```rust,no_run
//! use idxviz_cli::cache::{CacheSettings, RepositoryCacheManager};
//! use idxviz_cli::git::GitClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = CacheSettings::new("/tmp/idxviz-cache");
//! let manager = RepositoryCacheManager::open(settings, Arc::new(GitClient::new())).await?;
//!
//! let resolved = manager.resolve("https://github.com/rust-lang/log").await?;
//! println!("{} at {}", resolved.location, resolved.local_path.display());
//! # Ok(())
//! # }
//! ```

pub mod clock;
mod key_mutex;
pub mod keying;
pub mod lock;
pub mod manager;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use keying::{CacheKey, CanonicalLocation, canonicalize, key_for};
pub use lock::CacheLock;
pub use manager::{CacheSettings, RepositoryCacheManager, ResolvedRepository};
pub use store::{CacheEntry, CacheStore, ClearSummary, EvictionReport, RecoveryReport};
