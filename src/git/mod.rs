//! Source-control access.
//!
//! The cache manager talks to repositories only through the [`SourceControl`] trait so
//! that tests can substitute a fake. [`GitClient`] is the production implementation and
//! shells out to the system `git` binary, which means existing credential helpers, SSH
//! agents and git configuration apply unchanged.

pub mod command_builder;

use crate::cache::CanonicalLocation;
use crate::core::IdxvizError;
use anyhow::{Context, Result};
use command_builder::{GitCommand, git_program};
use futures::future::BoxFuture;
use std::path::Path;

/// Operations the cache needs from a version-control client.
pub trait SourceControl: Send + Sync {
    /// Clone `location` into `destination` (which must not exist) and return the
    /// remote identity recorded in the new working copy.
    fn fetch<'a>(&'a self, location: &'a CanonicalLocation, destination: &'a Path) -> BoxFuture<'a, Result<String>>;

    /// Open an existing working copy and return its recorded remote identity.
    ///
    /// Fails with [`IdxvizError::NotARepository`] when `path` is not a working copy.
    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>>;

    /// Paths tracked by the working copy at `path`, `/` separated.
    fn list_tracked_paths<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<String>>>;
}

/// [`SourceControl`] backed by the `git` command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitClient;

impl GitClient {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SourceControl for GitClient {
    fn fetch<'a>(&'a self, location: &'a CanonicalLocation, destination: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            GitCommand::clone(location.as_str(), destination)
                .with_context(format!("Fetching {location}"))
                .execute_success()
                .await?;

            self.open(destination).await
        })
    }

    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            ensure_valid_git_repo(path)?;
            let url = GitCommand::remote_url().current_dir(path).execute_stdout().await?;
            if url.is_empty() {
                return Err(IdxvizError::NotARepository {
                    path: path.display().to_string(),
                }
                .into());
            }
            Ok(url)
        })
    }

    fn list_tracked_paths<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            ensure_valid_git_repo(path)?;
            let output = GitCommand::ls_files().current_dir(path).execute().await?;
            Ok(output
                .stdout
                .split('\0')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect())
        })
    }
}

/// Whether a working `git` binary is on the `PATH`.
#[must_use]
pub fn is_git_installed() -> bool {
    std::process::Command::new(git_program())
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Fail with [`IdxvizError::GitNotFound`] if git is unavailable.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(IdxvizError::GitNotFound.into());
    }
    Ok(())
}

/// Whether `path` looks like a non-bare working copy.
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

pub fn ensure_valid_git_repo(path: &Path) -> Result<()> {
    if !is_valid_git_repo(path) {
        return Err(IdxvizError::NotARepository {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Version string reported by `git --version`.
pub async fn git_version() -> Result<String> {
    let output = GitCommand::version().execute_stdout().await?;
    Ok(output.trim_start_matches("git version ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_valid_git_repo() {
        let temp = TempDir::new().unwrap();
        assert!(!is_valid_git_repo(temp.path()));

        std::fs::create_dir(temp.path().join(".git")).unwrap();
        assert!(is_valid_git_repo(temp.path()));
    }

    #[tokio::test]
    async fn test_open_rejects_plain_directory() {
        let temp = TempDir::new().unwrap();
        let err = GitClient::new().open(temp.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IdxvizError>(),
            Some(IdxvizError::NotARepository { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_tracked_paths_rejects_plain_directory() {
        let temp = TempDir::new().unwrap();
        assert!(GitClient::new().list_tracked_paths(temp.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_git_version_when_installed() {
        if !is_git_installed() {
            return;
        }
        let version = git_version().await.unwrap();
        assert!(version.chars().next().is_some_and(|c| c.is_ascii_digit()));
    }
}
