//! Export a depth-limited graph of the index tree in Graphviz DOT format.
//!
//! ```bash
//! idxviz graph https://github.com/owner/repo | dot -Tsvg > repo.svg
//! idxviz graph ./checkout --depth 1 --expand src --expand docs
//! ```

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::warn;

use super::common::{CommandContext, absolutize_location};
use crate::constants::DEFAULT_GRAPH_DEPTH;
use crate::index::GitIndexDecoder;
use crate::tree::graph::TreeGraph;

#[derive(Args, Debug)]
pub struct GraphCommand {
    /// Repository URL or local path
    location: String,

    /// Levels below the root included in the graph
    #[arg(short = 'd', long, default_value_t = DEFAULT_GRAPH_DEPTH)]
    depth: usize,

    /// Additionally show the children of this directory (repeatable)
    #[arg(short = 'e', long = "expand", value_name = "PATH")]
    expand: Vec<String>,
}

impl GraphCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let manager = ctx.open_manager().await?;
        let location = absolutize_location(&self.location);

        let spinner = ctx.spinner(format!("Resolving {location}..."));
        let result = manager.load_tree(&location, Arc::new(GitIndexDecoder)).await;
        spinner.finish_and_clear();
        let (_, tree) = result?;

        let mut graph = TreeGraph::new(&tree, self.depth);
        // Expanding in the given order lets `--expand a --expand a/b` reach a/b
        for path in &self.expand {
            match graph.find(path) {
                Some(id) => {
                    graph.expand(id);
                }
                None => warn!("Cannot expand '{path}': not shown in the graph"),
            }
        }

        println!("{}", graph.to_dot());
        Ok(())
    }
}
