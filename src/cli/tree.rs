//! Print the file tree recorded in a repository's index.
//!
//! ```bash
//! idxviz tree https://github.com/owner/repo
//! idxviz tree ~/src/checkout --depth 2
//! idxviz tree git@github.com:owner/repo.git --format json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use super::common::{CommandContext, OutputFormat, absolutize_location, format_size};
use crate::index::GitIndexDecoder;
use crate::tree::render::render_tree;

#[derive(Args, Debug)]
pub struct TreeCommand {
    /// Repository URL or local path
    location: String,

    /// Maximum depth to display (unlimited if not specified)
    #[arg(short = 'd', long)]
    depth: Option<usize>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl TreeCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let location = absolutize_location(&self.location);

        let spinner = ctx.spinner(format!("Resolving {location}..."));
        let result = manager.load_tree(&location, Arc::new(GitIndexDecoder)).await;
        spinner.finish_and_clear();
        let (resolved, tree) = result?;

        match self.format {
            OutputFormat::Json => {
                let tree = match self.depth {
                    Some(depth) => tree.truncated(depth),
                    None => tree,
                };
                println!("{}", serde_json::to_string_pretty(&tree)?);
            }
            OutputFormat::Text => {
                print!("{}", render_tree(&tree, self.depth));
                println!(
                    "\n{} files, {} directories, {}{}",
                    tree.file_count(),
                    tree.directory_count().saturating_sub(1),
                    format_size(tree.total_size()),
                    if resolved.used_cache { " (cached)".dimmed().to_string() } else { String::new() }
                );
            }
        }
        Ok(())
    }
}
