//! In-memory stand-in for a source-control client.

use super::index_builder::IndexBuilder;
use crate::cache::{CanonicalLocation, canonicalize};
use crate::core::IdxvizError;
use crate::git::SourceControl;
use crate::index::{GitIndexDecoder, IndexDecoder};
use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// File inside a fake working copy holding the remote identity.
const ORIGIN_FILE: &str = "fake-origin";

#[derive(Debug, Clone, Default)]
struct FakeRepository {
    files: Vec<(String, u32)>,
    failure: Option<String>,
}

/// [`SourceControl`] that "clones" from a table of known repositories.
///
/// A fetch writes every configured file (filled with `size` bytes), a version 2
/// `.git/index` listing them, and `.git/fake-origin` holding the canonical location.
/// Unknown locations fail like a missing remote.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    repositories: Mutex<HashMap<String, FakeRepository>>,
    fetches: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

fn canonical_key(location: &str) -> String {
    canonicalize(location).map_or_else(|_| location.to_string(), |loc| loc.to_string())
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository with `(path, size)` files.
    pub fn with_repository(self, location: &str, files: &[(&str, u32)]) -> Self {
        self.set_files(location, files);
        self
    }

    pub fn set_files(&self, location: &str, files: &[(&str, u32)]) {
        let mut repos = self.repositories.lock().unwrap();
        let repo = repos.entry(canonical_key(location)).or_default();
        repo.files = files.iter().map(|(p, s)| ((*p).to_string(), *s)).collect();
    }

    /// Make every later fetch of `location` fail with `reason`.
    pub fn fail(&self, location: &str, reason: &str) {
        let mut repos = self.repositories.lock().unwrap();
        repos.entry(canonical_key(location)).or_default().failure = Some(reason.to_string());
    }

    /// Slow every fetch down, to widen race windows.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of fetches of `location` so far, failed ones included.
    pub fn fetch_count(&self, location: &str) -> usize {
        let key = canonical_key(location);
        self.fetches.lock().unwrap().iter().filter(|l| **l == key).count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    /// Overwrite the identity recorded in a fake working copy.
    pub fn rewrite_origin(working_copy: &Path, identity: &str) {
        std::fs::write(working_copy.join(".git").join(ORIGIN_FILE), identity).unwrap();
    }

    fn write_working_copy(destination: &Path, location: &CanonicalLocation, files: &[(String, u32)]) -> Result<()> {
        let git_dir = destination.join(".git");
        std::fs::create_dir_all(&git_dir)?;
        std::fs::write(git_dir.join(ORIGIN_FILE), location.as_str())?;

        let mut index = IndexBuilder::new(2);
        for (path, size) in files {
            let file = destination.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file, vec![b'x'; *size as usize])?;
            index = index.entry(path, *size);
        }
        index.write_to(&git_dir.join("index"))?;
        Ok(())
    }
}

impl SourceControl for FakeSourceControl {
    fn fetch<'a>(&'a self, location: &'a CanonicalLocation, destination: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.fetches.lock().unwrap().push(location.to_string());
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let repo = self.repositories.lock().unwrap().get(location.as_str()).cloned();
            let Some(repo) = repo else {
                return Err(anyhow!("repository '{location}' not found"));
            };
            if let Some(reason) = repo.failure {
                // Leave something behind, like a clone that died half way
                std::fs::create_dir_all(destination.join(".git"))?;
                return Err(anyhow!(reason));
            }

            Self::write_working_copy(destination, location, &repo.files)?;
            Ok(location.to_string())
        })
    }

    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            std::fs::read_to_string(path.join(".git").join(ORIGIN_FILE)).map_err(|_| {
                IdxvizError::NotARepository {
                    path: path.display().to_string(),
                }
                .into()
            })
        })
    }

    fn list_tracked_paths<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let entries = GitIndexDecoder.decode(&path.join(".git").join("index"))?;
            Ok(entries.into_iter().map(|e| e.name).collect())
        })
    }
}
