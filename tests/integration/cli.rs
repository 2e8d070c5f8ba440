//! Tests for the `idxviz` binary.

use super::git_available;
use assert_cmd::Command;
use idxviz_cli::test_utils::TestGit;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command isolated from the user's config and cache.
fn idxviz(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("idxviz").unwrap();
    cmd.env("HOME", temp.path())
        .env_remove("IDXVIZ_CACHE_DIR")
        .env_remove("RUST_LOG")
        .env("IDXVIZ_CONFIG_PATH", temp.path().join("config.toml"))
        .env("IDXVIZ_NO_PROGRESS", "1")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    idxviz(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tree"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_config_path_follows_env_and_flag() {
    let temp = TempDir::new().unwrap();
    let from_env = temp.path().join("config.toml");
    idxviz(&temp)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(from_env.display().to_string()));

    let explicit = temp.path().join("elsewhere.toml");
    idxviz(&temp)
        .arg("--config")
        .arg(&explicit)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(explicit.display().to_string()));
}

#[test]
fn test_config_init_then_show() {
    let temp = TempDir::new().unwrap();
    idxviz(&temp).args(["config", "init"]).assert().success();
    assert!(temp.path().join("config.toml").exists());

    std::fs::write(temp.path().join("config.toml"), "ttl_seconds = 42\n").unwrap();
    idxviz(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ttl_seconds = 42"))
        .stdout(predicate::str::contains("ttl         = 42s"));

    // A second init leaves the edited file alone
    idxviz(&temp).args(["config", "init"]).assert().success();
    let content = std::fs::read_to_string(temp.path().join("config.toml")).unwrap();
    assert!(content.contains("ttl_seconds = 42"));
}

#[test]
fn test_cache_path_precedence() {
    let temp = TempDir::new().unwrap();
    let flag_dir = temp.path().join("flag-cache");
    let env_dir = temp.path().join("env-cache");

    idxviz(&temp)
        .env("IDXVIZ_CACHE_DIR", &env_dir)
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env_dir.display().to_string()));

    idxviz(&temp)
        .env("IDXVIZ_CACHE_DIR", &env_dir)
        .arg("--cache-dir")
        .arg(&flag_dir)
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(flag_dir.display().to_string()));
}

#[test]
fn test_cache_clear_and_list_on_empty_cache() {
    let temp = TempDir::new().unwrap();
    let cache = temp.path().join("cache");

    idxviz(&temp)
        .arg("--cache-dir")
        .arg(&cache)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 cached repositories"));

    idxviz(&temp)
        .arg("--cache-dir")
        .arg(&cache)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached repositories."));

    idxviz(&temp)
        .arg("--cache-dir")
        .arg(&cache)
        .args(["cache", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_invalid_location_fails() {
    let temp = TempDir::new().unwrap();
    idxviz(&temp)
        .arg("--cache-dir")
        .arg(temp.path().join("cache"))
        .args(["tree", "relative/not/here"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("relative/not/here"));
}

#[test]
fn test_zero_max_entries_is_rejected() {
    let temp = TempDir::new().unwrap();
    idxviz(&temp)
        .arg("--cache-dir")
        .arg(temp.path().join("cache"))
        .args(["--max-entries", "0", "cache", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_cached_entries must be at least 1"));
}

#[test]
fn test_tree_and_graph_of_local_repository() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let origin = temp.path().join("demo");
    std::fs::create_dir_all(&origin).unwrap();
    let git = TestGit::new(&origin);
    git.init().unwrap();
    git.config_user().unwrap();
    git.add_file("docs/guide.md", "# Guide\n").unwrap();
    git.add_file("Cargo.toml", "[package]\n").unwrap();
    git.commit("Initial commit").unwrap();

    let cache = temp.path().join("cache");
    idxviz(&temp)
        .arg("--cache-dir")
        .arg(&cache)
        .arg("tree")
        .arg(&origin)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("demo\n"))
        .stdout(predicate::str::contains("└── guide.md (8 bytes)"))
        .stdout(predicate::str::contains("Cargo.toml (10 bytes)"));

    idxviz(&temp)
        .arg("--cache-dir")
        .arg(&cache)
        .args(["graph", "--depth", "1"])
        .arg(&origin)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph {"))
        .stdout(predicate::str::contains("label = \"docs\""))
        .stdout(predicate::str::contains("guide.md").not());

    idxviz(&temp)
        .arg("--cache-dir")
        .arg(&cache)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 5 entries"));
}
