//! Make a repository available locally and print where it is.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, OutputFormat, absolutize_location};

#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Repository URL or local path
    location: String,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl ResolveCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let location = absolutize_location(&self.location);

        let spinner = ctx.spinner(format!("Resolving {location}..."));
        let result = manager.resolve(&location).await;
        spinner.finish_and_clear();
        let resolved = result?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
            OutputFormat::Text => {
                println!("{}", resolved.local_path.display());
                let source = if resolved.used_cache {
                    "reused cached copy".green()
                } else {
                    "fetched".yellow()
                };
                eprintln!("{} {} ({})", source, resolved.location, resolved.key.short());
            }
        }
        Ok(())
    }
}
