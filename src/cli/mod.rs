//! Command-line interface for idxviz.
//!
//! # Commands
//!
//! - `tree` - Print the file tree recorded in a repository's index
//! - `graph` - Export a depth-limited tree graph as Graphviz DOT
//! - `files` - List tracked paths
//! - `resolve` - Fetch (or reuse) a working copy and print its path
//! - `cache` - Inspect and maintain the repository cache
//! - `config` - Manage the global configuration file
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - More or less log output on stderr
//! - `--no-progress` - Hide the spinner
//! - `--config` - Use another configuration file
//! - `--cache-dir`, `--ttl`, `--max-entries` - Override cache settings for this run
//!
//! ```bash
//! idxviz tree https://github.com/owner/repo --depth 2
//! idxviz --max-entries 10 graph ./checkout | dot -Tpng > tree.png
//! idxviz --quiet cache clear
//! ```

pub mod cache;
pub mod common;
pub mod config;
pub mod files;
pub mod graph;
pub mod resolve;
pub mod tree;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CacheOverrides;
use common::CommandContext;

#[derive(Parser, Debug)]
#[command(
    name = "idxviz",
    about = "Visualize the staged-file index of a Git repository",
    version,
    long_about = "idxviz fetches a repository (or reuses a cached copy), reads its Git index and \
                  shows the tracked files as a tree or a graph."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable the progress spinner
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cache directory for this run
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Seconds a cached copy stays fresh
    #[arg(long, global = true, value_name = "SECS")]
    pub ttl: Option<u64>,

    /// Maximum number of cached copies
    #[arg(long, global = true, value_name = "N")]
    pub max_entries: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the file tree recorded in a repository's index
    Tree(tree::TreeCommand),

    /// Export the tree as a Graphviz DOT graph
    Graph(graph::GraphCommand),

    /// List the paths a repository tracks
    Files(files::FilesCommand),

    /// Fetch or reuse a working copy and print its local path
    Resolve(resolve::ResolveCommand),

    /// Manage the repository cache
    Cache(cache::CacheCommand),

    /// Manage the global configuration
    Config(config::ConfigCommand),
}

impl Cli {
    /// Log filter for the tracing subscriber when `RUST_LOG` is not set.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    #[must_use]
    pub fn context(&self) -> CommandContext {
        CommandContext {
            config_path: self.config.clone(),
            overrides: CacheOverrides {
                cache_dir: self.cache_dir.clone(),
                ttl_seconds: self.ttl,
                max_entries: self.max_entries,
            },
            no_progress: self.no_progress,
        }
    }

    pub async fn execute(self) -> Result<()> {
        let ctx = self.context();
        match self.command {
            Commands::Tree(cmd) => cmd.execute(&ctx).await,
            Commands::Graph(cmd) => cmd.execute(&ctx).await,
            Commands::Files(cmd) => cmd.execute(&ctx).await,
            Commands::Resolve(cmd) => cmd.execute(&ctx).await,
            Commands::Cache(cmd) => cmd.execute(&ctx).await,
            Commands::Config(cmd) => cmd.execute(&ctx).await,
        }
    }
}
