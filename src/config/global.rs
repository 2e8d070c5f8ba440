//! User configuration stored in `~/.idxviz/config.toml`.
//!
//! The file only holds cache settings. Every field is optional in the file; a missing
//! field (or a missing file) means the built-in default.
//!
//! ```toml
//! # Reuse a fetched working copy for one hour
//! ttl_seconds = 3600
//! max_cached_entries = 10
//! cache_dir = "/var/tmp/idxviz"
//! ```
//!
//! The file location can be overridden with the `IDXVIZ_CONFIG_PATH` environment variable
//! or an explicit path passed to [`GlobalConfig::load_with_optional`].

use crate::constants::{DEFAULT_MAX_CACHED_ENTRIES, DEFAULT_TTL_SECONDS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "IDXVIZ_CONFIG_PATH";

const fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

const fn default_max_cached_entries() -> usize {
    DEFAULT_MAX_CACHED_ENTRIES
}

/// Global configuration for idxviz.
///
/// # Examples
///
/// ```rust,no_run
/// use idxviz_cli::config::GlobalConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut config = GlobalConfig::load().await?;
/// config.max_cached_entries = 10;
/// config.save().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Seconds a fetched working copy is reused before it is fetched again.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum number of working copies kept in the cache. Must be at least 1.
    #[serde(default = "default_max_cached_entries")]
    pub max_cached_entries: usize,

    /// Cache root. Defaults to `~/.idxviz/cache` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            max_cached_entries: DEFAULT_MAX_CACHED_ENTRIES,
            cache_dir: None,
        }
    }
}

impl GlobalConfig {
    /// Load from [`GlobalConfig::default_path`], or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined, or the file exists but cannot be
    /// read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, otherwise from the default location.
    ///
    /// A missing file yields the defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from a specific file, which must exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save to the default location.
    pub async fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path).await
    }

    /// Save as pretty TOML, creating parent directories as needed. The file is replaced
    /// atomically.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let dir = match target.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut file = tempfile::NamedTempFile::new_in(dir)?;
            file.write_all(content.as_bytes())?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .context("Config write task failed")?
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Path of the configuration file.
    ///
    /// - `IDXVIZ_CONFIG_PATH`, when set and non-empty
    /// - **Windows**: `%LOCALAPPDATA%\idxviz\config.toml`
    /// - **Unix/macOS**: `~/.idxviz/config.toml`
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }
        Ok(super::idxviz_home()?.join("config.toml"))
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.ttl_seconds, 86400);
        assert_eq!(config.max_cached_entries, 5);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.ttl(), Duration::from_secs(86400));
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let config = GlobalConfig {
            ttl_seconds: 60,
            max_cached_entries: 2,
            cache_dir: Some(temp.path().join("cache")),
        };
        config.save_to(&path).await.unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "max_cached_entries = 9\n").unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.max_cached_entries, 9);
        assert_eq!(loaded.ttl_seconds, DEFAULT_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let loaded =
            GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(loaded, GlobalConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_toml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "ttl_seconds = \"soon\"\n").unwrap();

        let err = GlobalConfig::load_from(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_unset_cache_dir_not_serialized() {
        let text = toml::to_string_pretty(&GlobalConfig::default()).unwrap();
        assert!(!text.contains("cache_dir"));
        assert!(text.contains("ttl_seconds = 86400"));
    }
}
