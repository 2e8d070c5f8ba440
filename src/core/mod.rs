//! Core types shared by every idxviz module
//!
//! - [`error`] - the [`IdxvizError`] taxonomy and user-facing [`ErrorContext`]
//! - [`file_error`] - structured context for failed file system operations

pub mod error;
pub mod file_error;

pub use error::{ErrorContext, IdxvizError, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileResultExt};
