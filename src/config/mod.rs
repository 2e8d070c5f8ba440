//! Configuration for idxviz.
//!
//! Settings come from four layers, highest priority first:
//!
//! 1. Command-line flags (`--cache-dir`, `--ttl`, `--max-entries`)
//! 2. Environment variables (`IDXVIZ_CACHE_DIR`, `IDXVIZ_CONFIG_PATH`)
//! 3. The global configuration file (`~/.idxviz/config.toml`)
//! 4. Built-in defaults
//!
//! [`cache_settings`] folds these into the validated
//! [`CacheSettings`](crate::cache::CacheSettings) the cache manager is opened with.
//!
//! ```rust,no_run
//! use idxviz_cli::config::{CacheOverrides, GlobalConfig, cache_settings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::load().await?;
//! let overrides = CacheOverrides { max_entries: Some(3), ..Default::default() };
//! let settings = cache_settings(&config, &overrides)?;
//! println!("Cache at {}", settings.cache_dir.display());
//! # Ok(())
//! # }
//! ```

mod global;

pub use global::{CONFIG_PATH_ENV, GlobalConfig};

use crate::cache::CacheSettings;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "IDXVIZ_CACHE_DIR";

/// Values given on the command line, each overriding the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOverrides {
    pub cache_dir: Option<PathBuf>,
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<usize>,
}

/// The idxviz home directory: `~/.idxviz`, or `%LOCALAPPDATA%\idxviz` on Windows.
pub(crate) fn idxviz_home() -> Result<PathBuf> {
    let home = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("idxviz")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".idxviz")
    };
    Ok(home)
}

/// Get the cache directory.
///
/// # Location Priority
///
/// 1. `IDXVIZ_CACHE_DIR` environment variable (if set and non-empty)
/// 2. `cache_dir` from the configuration file
/// 3. `~/.idxviz/cache` (`%LOCALAPPDATA%\idxviz\cache` on Windows)
///
/// The directory is not created here; opening the cache does that.
///
/// # Errors
///
/// Returns an error if no override is set and the home directory cannot be determined.
pub fn get_cache_dir(config: &GlobalConfig) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = &config.cache_dir {
        return Ok(dir.clone());
    }
    Ok(idxviz_home()?.join("cache"))
}

/// Build validated cache settings from the configuration file and command-line overrides.
///
/// # Errors
///
/// Returns a `ConfigError` when the resulting entry limit is zero, or an error when the cache
/// directory cannot be determined.
pub fn cache_settings(config: &GlobalConfig, overrides: &CacheOverrides) -> Result<CacheSettings> {
    let cache_dir = match &overrides.cache_dir {
        Some(dir) => dir.clone(),
        None => get_cache_dir(config)?,
    };
    let ttl = Duration::from_secs(overrides.ttl_seconds.unwrap_or(config.ttl_seconds));
    let max_entries = overrides.max_entries.unwrap_or(config.max_cached_entries);

    let settings = CacheSettings::new(cache_dir).with_ttl(ttl).with_max_entries(max_entries);
    settings.validate()?;
    Ok(settings)
}
