//! Structured file system error handling
//!
//! Captures operation context (what was being done, to which path, by whom) at the
//! call site instead of reconstructing it later from an `io::Error` message.

use std::path::PathBuf;
use thiserror::Error;

/// The kind of file system operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Rename,
    Remove,
    Metadata,
    CreateDir,
    ReadDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Rename => write!(f, "renaming"),
            FileOperation::Remove => write!(f, "removing"),
            FileOperation::Metadata => write!(f, "getting metadata of"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::ReadDir => write!(f, "listing directory"),
        }
    }
}

/// A failed file operation together with the context it was attempted in.
#[derive(Error, Debug)]
#[error("Failed {operation} {} while {purpose} ({caller})", file_path.display())]
pub struct FileOperationError {
    pub operation: FileOperation,
    pub file_path: PathBuf,
    pub purpose: String,
    pub caller: String,
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    pub fn new(
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            caller: caller.into(),
            source,
        }
    }

    /// Whether the underlying failure was a permissions problem.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.source.kind() == std::io::ErrorKind::PermissionDenied
    }
}

/// Extension trait attaching [`FileOperationError`] context to `io::Result`s.
pub trait FileResultExt<T> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for Result<T, std::io::Error> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|source| FileOperationError::new(operation, file_path, purpose, caller, source))
    }
}
