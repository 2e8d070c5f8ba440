//! Integration test suite for idxviz
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cache_flow**: repository cache behavior through the public API, with a fake client
//! - **real_git**: end-to-end runs against repositories created with the system `git`
//! - **cli**: the `idxviz` binary

mod cache_flow;
mod cli;
mod real_git;

/// Whether the system `git` is usable; real-git tests skip themselves otherwise.
pub fn git_available() -> bool {
    idxviz_cli::git::is_git_installed()
}
