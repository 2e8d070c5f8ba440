//! Global constants used throughout the idxviz codebase.
//!
//! Timeouts, retry parameters, cache defaults and on-disk names live here so that
//! magic numbers stay discoverable.

use std::time::Duration;

/// Default time-to-live for a cached working copy (24 hours).
pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Default maximum number of cached working copies.
pub const DEFAULT_MAX_CACHED_ENTRIES: usize = 5;

/// Default timeout for cache lock acquisition (120 seconds).
///
/// Must cover one full clone, since a second resolve of the same location waits
/// for the first to finish.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum backoff delay while polling a file lock (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for lock polling backoff (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Timeout for Git clone operations (10 minutes).
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for other Git commands (5 minutes).
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Name of the directory holding committed cache entry records.
pub const ENTRIES_DIR: &str = ".entries";

/// Name of the directory holding in-flight fetches.
pub const STAGING_DIR: &str = ".staging";

/// Name of the directory holding cross-process lock files.
pub const LOCKS_DIR: &str = ".locks";

/// Default depth of the exported graph view.
pub const DEFAULT_GRAPH_DEPTH: usize = 2;
