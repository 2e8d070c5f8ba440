//! Manage the global configuration file.
//!
//! ```bash
//! idxviz config          # same as `config show`
//! idxviz config path
//! idxviz config init --force
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::common::CommandContext;
use crate::config::GlobalConfig;

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommands {
    /// Display the configuration in effect (default)
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with the default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        match self.command {
            Some(ConfigSubcommands::Show) | None => Self::show(ctx).await,
            Some(ConfigSubcommands::Path) => {
                println!("{}", ctx.config_file()?.display());
                Ok(())
            }
            Some(ConfigSubcommands::Init {
                force,
            }) => Self::init(ctx, force).await,
        }
    }

    async fn show(ctx: &CommandContext) -> Result<()> {
        let path = ctx.config_file()?;
        let config = ctx.load_config().await?;
        let settings = ctx.cache_settings().await?;

        println!("{}", "Configuration".bold());
        if path.exists() {
            println!("Location: {}\n", path.display());
        } else {
            println!("Location: {} {}\n", path.display(), "(not created, using defaults)".dimmed());
        }
        print!("{}", toml::to_string_pretty(&config)?);
        println!("\n{}", "Effective cache settings".bold());
        println!("  cache_dir   = {}", settings.cache_dir.display());
        println!("  ttl         = {}s", settings.ttl.as_secs());
        println!("  max_entries = {}", settings.max_entries);
        Ok(())
    }

    async fn init(ctx: &CommandContext, force: bool) -> Result<()> {
        let path = ctx.config_file()?;
        if path.exists() && !force {
            println!("{} Config already exists at: {}", "!".yellow(), path.display());
            println!("   Use --force to overwrite");
            return Ok(());
        }

        let config = GlobalConfig::default();
        config.save_to(&path).await?;
        println!("{} Created config at: {}", "✓".green(), path.display());
        print!("{}", toml::to_string_pretty(&config)?);
        Ok(())
    }
}
