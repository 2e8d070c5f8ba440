//! idxviz - visualize the staged-file index of a Git repository
//!
//! idxviz takes a repository location (a remote URL or a local path), makes a working copy
//! available through a bounded on-disk cache, reads the copy's `.git/index` and turns the
//! flat list of tracked paths into a file tree. The tree can be printed, exported as JSON
//! or drawn as a depth-limited Graphviz graph.
//!
//! # Core Modules
//!
//! - [`cache`] - Canonical keys, the on-disk store, and resolution of locations to working
//!   copies with TTL expiry and LRU eviction
//! - [`git`] - Source-control client over the system `git` command
//! - [`index`] - Decoder for the Git index file format (versions 2 to 4)
//! - [`tree`] - Path tree building, ASCII rendering and graph export
//!
//! ## Supporting Modules
//!
//! - [`cli`] - Command-line interface
//! - [`config`] - Global configuration (`~/.idxviz/config.toml`)
//! - [`constants`] - Timeouts, cache defaults and on-disk names
//! - [`core`] - Error types and user-facing error reporting
//! - [`utils`] - Progress spinner
//!
//! # Example
//!
//! ```rust,no_run
//! use idxviz_cli::cache::{CacheSettings, RepositoryCacheManager};
//! use idxviz_cli::git::GitClient;
//! use idxviz_cli::index::GitIndexDecoder;
//! use idxviz_cli::tree::render::render_tree;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = CacheSettings::new("/tmp/idxviz-cache");
//! let manager = RepositoryCacheManager::open(settings, Arc::new(GitClient::new())).await?;
//!
//! let (resolved, tree) =
//!     manager.load_tree("https://github.com/owner/repo", Arc::new(GitIndexDecoder)).await?;
//! println!("{}", resolved.local_path.display());
//! print!("{}", render_tree(&tree, Some(2)));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod index;
pub mod tree;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
