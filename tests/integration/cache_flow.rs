//! Cache behavior seen through `RepositoryCacheManager`, backed by `FakeSourceControl`.

use idxviz_cli::cache::{CacheSettings, RepositoryCacheManager, canonicalize, key_for};
use idxviz_cli::constants::STAGING_DIR;
use idxviz_cli::core::IdxvizError;
use idxviz_cli::index::GitIndexDecoder;
use idxviz_cli::test_utils::{FakeSourceControl, IndexBuilder, ManualClock, init_test_logging};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const ALPHA: &str = "https://github.com/owner/alpha";
const BETA: &str = "https://github.com/owner/beta";
const GAMMA: &str = "https://github.com/owner/gamma";

fn fake() -> Arc<FakeSourceControl> {
    Arc::new(
        FakeSourceControl::new()
            .with_repository(ALPHA, &[("README.md", 10), ("src/main.rs", 30), ("src/util/mod.rs", 5)])
            .with_repository(BETA, &[("index.js", 7)])
            .with_repository(GAMMA, &[("go.mod", 1)]),
    )
}

async fn open(
    root: &std::path::Path,
    client: Arc<FakeSourceControl>,
    clock: &ManualClock,
    max_entries: usize,
) -> RepositoryCacheManager {
    let settings =
        CacheSettings::new(root).with_ttl(Duration::from_secs(3600)).with_max_entries(max_entries);
    RepositoryCacheManager::open_with_clock(settings, client, Arc::new(clock.clone())).await.unwrap()
}

fn kind(err: &anyhow::Error) -> Option<&IdxvizError> {
    err.chain().find_map(|e| e.downcast_ref::<IdxvizError>())
}

#[tokio::test]
async fn test_load_tree_end_to_end() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let manager = open(temp.path(), fake(), &ManualClock::default(), 5).await;

    let (resolved, tree) = manager.load_tree(ALPHA, Arc::new(GitIndexDecoder)).await.unwrap();

    assert!(!resolved.used_cache);
    assert_eq!(tree.name, "alpha");
    assert_eq!(tree.total_size(), 45);
    assert_eq!(tree.file_count(), 3);
    assert_eq!(tree.get("src/util/mod.rs").unwrap().size, 5);
    assert_eq!(tree.leaf_paths(), vec!["README.md", "src/main.rs", "src/util/mod.rs"]);

    let (again, _) = manager.load_tree(ALPHA, Arc::new(GitIndexDecoder)).await.unwrap();
    assert!(again.used_cache);
}

#[tokio::test]
async fn test_managers_share_one_cache_directory() {
    let temp = TempDir::new().unwrap();
    let client = fake();
    let clock = ManualClock::default();

    let first = open(temp.path(), client.clone(), &clock, 5).await;
    let resolved = first.resolve(BETA).await.unwrap();
    drop(first);

    let second = open(temp.path(), client.clone(), &clock, 5).await;
    let reused = second.resolve(BETA).await.unwrap();

    assert!(reused.used_cache);
    assert_eq!(reused.local_path, resolved.local_path);
    assert_eq!(client.fetch_count(BETA), 1);
}

#[tokio::test]
async fn test_lru_across_resolves() {
    let temp = TempDir::new().unwrap();
    let client = fake();
    let clock = ManualClock::default();
    let manager = open(temp.path(), client.clone(), &clock, 2).await;

    manager.resolve(ALPHA).await.unwrap();
    clock.advance(Duration::from_secs(1));
    manager.resolve(BETA).await.unwrap();
    clock.advance(Duration::from_secs(1));
    // Touch alpha so beta becomes least recently used
    assert!(manager.resolve(ALPHA).await.unwrap().used_cache);
    clock.advance(Duration::from_secs(1));
    manager.resolve(GAMMA).await.unwrap();

    let keys: Vec<_> = manager.entries().await.unwrap().into_iter().map(|e| e.key).collect();
    let alpha = key_for(&canonicalize(ALPHA).unwrap());
    let gamma = key_for(&canonicalize(GAMMA).unwrap());
    assert_eq!(keys, vec![alpha, gamma]);

    assert!(!manager.resolve(BETA).await.unwrap().used_cache);
    assert_eq!(client.fetch_count(BETA), 2);
}

#[tokio::test]
async fn test_error_kinds_stay_distinct() {
    let temp = TempDir::new().unwrap();
    let client = fake();
    client.fail(GAMMA, "connection reset");
    let manager = open(temp.path(), client, &ManualClock::default(), 5).await;

    let err = manager.resolve("not a location").await.unwrap_err();
    assert!(matches!(kind(&err), Some(IdxvizError::CanonicalizationError { .. })));

    let err = manager.resolve("https://github.com/owner/missing").await.unwrap_err();
    assert!(matches!(kind(&err), Some(IdxvizError::FetchError { .. })));

    let err = manager.resolve(GAMMA).await.unwrap_err();
    match kind(&err) {
        Some(IdxvizError::FetchError { reason, .. }) => assert!(reason.contains("connection reset")),
        other => panic!("expected FetchError, got {other:?}"),
    }
    assert!(manager.entries().await.unwrap().is_empty());

    // A corrupted index is a decode problem, not a fetch problem
    let resolved = manager.resolve(ALPHA).await.unwrap();
    std::fs::write(resolved.local_path.join(".git").join("index"), b"garbage").unwrap();
    let err = manager.load_tree(ALPHA, Arc::new(GitIndexDecoder)).await.unwrap_err();
    assert!(matches!(kind(&err), Some(IdxvizError::DecodeError { .. })));

    // A path used both as file and directory
    IndexBuilder::new(2)
        .entry("docs", 1)
        .entry("docs/guide.md", 2)
        .write_to(&resolved.local_path.join(".git").join("index"))
        .unwrap();
    let err = manager.load_tree(ALPHA, Arc::new(GitIndexDecoder)).await.unwrap_err();
    match kind(&err) {
        Some(IdxvizError::TreeConflict { path }) => assert_eq!(path, "docs"),
        other => panic!("expected TreeConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reopen_cleans_interrupted_fetch() {
    let temp = TempDir::new().unwrap();
    let client = fake();
    let clock = ManualClock::default();

    let manager = open(temp.path(), client.clone(), &clock, 5).await;
    let resolved = manager.resolve(ALPHA).await.unwrap();
    drop(manager);

    // What a crashed process leaves behind: a half-written staging dir and a dangling record
    let staging = temp.path().join(STAGING_DIR).join(format!("{}-interrupted", resolved.key));
    std::fs::create_dir_all(staging.join(".git")).unwrap();
    std::fs::remove_dir_all(&resolved.local_path).unwrap();

    let manager = open(temp.path(), client.clone(), &clock, 5).await;
    assert!(!staging.exists());
    assert!(manager.entries().await.unwrap().is_empty());

    let again = manager.resolve(ALPHA).await.unwrap();
    assert!(!again.used_cache);
    assert!(again.local_path.join("README.md").exists());
}

#[tokio::test]
async fn test_concurrent_resolves_of_different_repositories() {
    let temp = TempDir::new().unwrap();
    let client = fake();
    client.set_delay(Duration::from_millis(20));
    let manager = open(temp.path(), client.clone(), &ManualClock::default(), 5).await;

    let (a, b, c) = tokio::join!(manager.resolve(ALPHA), manager.resolve(BETA), manager.resolve(ALPHA));

    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert_eq!(a.local_path, c.local_path);
    assert_ne!(a.local_path, b.local_path);
    assert_eq!(client.fetch_count(ALPHA), 1);
    assert_eq!(client.total_fetches(), 2);
}

#[tokio::test]
async fn test_prune_after_ttl() {
    let temp = TempDir::new().unwrap();
    let clock = ManualClock::default();
    let manager = open(temp.path(), fake(), &clock, 5).await;

    manager.resolve(ALPHA).await.unwrap();
    manager.resolve(BETA).await.unwrap();
    clock.advance(Duration::from_secs(3601));

    let report = manager.prune().await.unwrap();
    assert_eq!(report.expired.len(), 2);
    assert!(report.evicted.is_empty());
    assert!(manager.entries().await.unwrap().is_empty());
}
