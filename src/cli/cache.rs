//! Inspect and maintain the repository cache.
//!
//! ```bash
//! idxviz cache list            # entries, least recently used first
//! idxviz cache prune           # apply the TTL and size limit now
//! idxviz cache clear           # remove every cached copy
//! idxviz cache path            # print the cache directory
//! ```

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::common::{CommandContext, OutputFormat};

#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: Option<CacheSubcommands>,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommands {
    /// List cached working copies (default)
    List {
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove expired copies, then least recently used ones above the limit
    Prune,
    /// Remove every cached copy
    Clear,
    /// Print the cache directory
    Path,
}

impl CacheCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        match self.command.unwrap_or(CacheSubcommands::List {
            format: OutputFormat::Text,
        }) {
            CacheSubcommands::List {
                format,
            } => Self::list(ctx, format).await,
            CacheSubcommands::Prune => Self::prune(ctx).await,
            CacheSubcommands::Clear => Self::clear(ctx).await,
            CacheSubcommands::Path => {
                let settings = ctx.cache_settings().await?;
                println!("{}", settings.cache_dir.display());
                Ok(())
            }
        }
    }

    async fn list(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let entries = manager.entries().await?;

        if format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("No cached repositories.");
            return Ok(());
        }

        let now = Utc::now();
        let ttl = manager.settings().ttl;
        println!(
            "{} ({} of {} entries)",
            manager.cache_dir().display().to_string().bold(),
            entries.len(),
            manager.settings().max_entries
        );
        for entry in &entries {
            let state = if entry.is_fresh(now, ttl) {
                "fresh".green()
            } else {
                "expired".yellow()
            };
            println!(
                "  {}  {}  {}  last used {}",
                entry.key.short().dimmed(),
                state,
                entry.origin_identity,
                entry.last_accessed_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Ok(())
    }

    async fn prune(ctx: &CommandContext) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let report = manager.prune().await?;

        println!(
            "Pruned {} entries ({} expired, {} over the limit)",
            report.removed_count(),
            report.expired.len(),
            report.evicted.len()
        );
        for failure in &report.failed {
            println!("  {} {}", "skipped".yellow(), failure);
        }
        Ok(())
    }

    async fn clear(ctx: &CommandContext) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let summary = manager.clear_all().await?;

        println!("Removed {} cached repositories", summary.removed_count);
        if summary.failed_count > 0 {
            println!(
                "{} {} entries could not be removed (in use by another process?)",
                "warning:".yellow(),
                summary.failed_count
            );
        }
        Ok(())
    }
}
