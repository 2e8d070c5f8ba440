//! Terminal helpers shared by the commands.
//!
//! - [`progress`] - spinner shown while a repository is resolved

pub mod progress;

pub use progress::{Spinner, is_progress_disabled};
