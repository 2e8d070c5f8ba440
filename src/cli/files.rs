//! List the paths a repository tracks, one per line.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, absolutize_location};

#[derive(Args, Debug)]
pub struct FilesCommand {
    /// Repository URL or local path
    location: String,
}

impl FilesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let location = absolutize_location(&self.location);

        let spinner = ctx.spinner(format!("Resolving {location}..."));
        let result = manager.list_tracked_paths(&location).await;
        spinner.finish_and_clear();
        let (_, paths) = result?;

        for path in paths {
            println!("{path}");
        }
        Ok(())
    }
}
