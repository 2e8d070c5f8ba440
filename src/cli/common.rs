//! Shared state for CLI commands.

use anyhow::Result;
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheSettings, RepositoryCacheManager};
use crate::config::{CacheOverrides, GlobalConfig, cache_settings};
use crate::git::GitClient;
use crate::utils::progress::Spinner;

/// Output format for commands that can print machine-readable data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Global options every command runs with.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Explicit configuration file, from `--config`.
    pub config_path: Option<PathBuf>,
    pub overrides: CacheOverrides,
    pub no_progress: bool,
}

impl CommandContext {
    pub async fn load_config(&self) -> Result<GlobalConfig> {
        GlobalConfig::load_with_optional(self.config_path.clone()).await
    }

    /// Path of the configuration file in effect.
    pub fn config_file(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => GlobalConfig::default_path(),
        }
    }

    pub async fn cache_settings(&self) -> Result<CacheSettings> {
        let config = self.load_config().await?;
        cache_settings(&config, &self.overrides)
    }

    /// Open the repository cache backed by the system `git`.
    pub async fn open_manager(&self) -> Result<RepositoryCacheManager> {
        let settings = self.cache_settings().await?;
        RepositoryCacheManager::open(settings, Arc::new(GitClient::new())).await
    }

    pub fn spinner(&self, msg: impl Into<String>) -> Spinner {
        Spinner::new(msg, self.no_progress)
    }
}

/// Turn a relative path to an existing directory into an absolute one.
///
/// Anything else (URLs, absolute paths, paths that do not exist) is returned unchanged and
/// left for canonicalization to accept or reject.
pub fn absolutize_location(location: &str) -> String {
    let path = Path::new(location);
    if path.is_relative()
        && path.is_dir()
        && let Ok(absolute) = std::path::absolute(path)
    {
        return absolute.display().to_string();
    }
    location.to_string()
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_absolutize_location() {
        assert_eq!(absolutize_location("https://example.com/r.git"), "https://example.com/r.git");
        assert_eq!(absolutize_location("no/such/dir"), "no/such/dir");
        assert!(Path::new(&absolutize_location(".")).is_absolute());
    }

    #[tokio::test]
    async fn test_settings_from_config_file_and_flags() {
        let temp = tempfile::TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(&config_path, "ttl_seconds = 30\nmax_cached_entries = 4\n").unwrap();

        let ctx = CommandContext {
            config_path: Some(config_path.clone()),
            overrides: CacheOverrides {
                cache_dir: Some(temp.path().join("cache")),
                max_entries: Some(2),
                ..Default::default()
            },
            no_progress: true,
        };

        let settings = ctx.cache_settings().await.unwrap();
        assert_eq!(settings.ttl, std::time::Duration::from_secs(30));
        assert_eq!(settings.max_entries, 2);
        assert_eq!(settings.cache_dir, temp.path().join("cache"));
        assert_eq!(ctx.config_file().unwrap(), config_path);
    }
}
