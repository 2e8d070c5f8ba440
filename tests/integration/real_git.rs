//! End-to-end runs against repositories created with the system `git`.

use super::git_available;
use idxviz_cli::cache::{CacheSettings, RepositoryCacheManager};
use idxviz_cli::core::IdxvizError;
use idxviz_cli::git::{GitClient, SourceControl};
use idxviz_cli::index::GitIndexDecoder;
use idxviz_cli::test_utils::TestGit;
use idxviz_cli::tree::render::render_tree;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn create_origin(dir: &Path) -> TestGit {
    std::fs::create_dir_all(dir).unwrap();
    let git = TestGit::new(dir);
    git.init().unwrap();
    git.config_user().unwrap();
    git.add_file("README.md", "hello\n").unwrap();
    git.add_file("src/lib.rs", "pub fn f() {}\n").unwrap();
    git.add_file("src/bin/main.rs", "fn main() {}\n").unwrap();
    git.commit("Initial commit").unwrap();
    git
}

#[tokio::test]
async fn test_tree_of_local_repository() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let origin = temp.path().join("origin");
    create_origin(&origin);
    let location = origin.display().to_string();

    let settings = CacheSettings::new(temp.path().join("cache"));
    let manager = RepositoryCacheManager::open(settings, Arc::new(GitClient::new())).await.unwrap();

    let (resolved, tree) = manager.load_tree(&location, Arc::new(GitIndexDecoder)).await.unwrap();
    assert!(!resolved.used_cache);
    assert!(resolved.local_path.starts_with(temp.path().join("cache")));
    assert_eq!(tree.name, "origin");
    assert_eq!(tree.get("README.md").unwrap().size, 6);
    assert_eq!(tree.get("src/bin/main.rs").unwrap().size, 13);
    assert_eq!(tree.file_count(), 3);

    let rendered = render_tree(&tree, None);
    assert!(rendered.starts_with("origin\n"));
    assert!(rendered.contains("README.md (6 bytes)"));

    let (reused, paths) = manager.list_tracked_paths(&location).await.unwrap();
    assert!(reused.used_cache);
    assert_eq!(paths, vec!["README.md", "src/bin/main.rs", "src/lib.rs"]);
}

#[tokio::test]
async fn test_retargeted_remote_is_fetched_again() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let origin = temp.path().join("origin");
    create_origin(&origin);
    let location = origin.display().to_string();

    let settings = CacheSettings::new(temp.path().join("cache"));
    let manager = RepositoryCacheManager::open(settings, Arc::new(GitClient::new())).await.unwrap();
    let first = manager.resolve(&location).await.unwrap();

    // Someone points the cached copy somewhere else
    TestGit::new(&first.local_path).set_remote_url("origin", "https://example.com/other.git").unwrap();

    let second = manager.resolve(&location).await.unwrap();
    assert!(!second.used_cache);
    let identity = GitClient::new().open(&second.local_path).await.unwrap();
    assert_eq!(identity, location);
}

#[tokio::test]
async fn test_open_reports_remote_url() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let git = create_origin(&temp.path().join("work"));
    git.remote_add("origin", "https://github.com/owner/repo.git").unwrap();

    let identity = GitClient::new().open(git.repo_path()).await.unwrap();
    assert_eq!(identity, "https://github.com/owner/repo.git");

    let err = GitClient::new().open(temp.path()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IdxvizError>(),
        Some(IdxvizError::NotARepository { .. })
    ));
}
