//! Error handling for idxviz
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can tell failure kinds apart
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`IdxvizError`] - enumerated error kinds for every failure in the crate
//! - [`ErrorContext`] - wrapper adding a suggestion and details for display
//!
//! Fallible I/O operations return [`anyhow::Result`] with an [`IdxvizError`] at the root of
//! the chain; use `error.downcast_ref::<IdxvizError>()` to branch on the kind. Pure
//! transforms (location keying, tree construction) return `Result<T, IdxvizError>` directly.
//!
//! The kinds a caller of [`crate::cache::RepositoryCacheManager::resolve`] can observe are:
//! - [`IdxvizError::CanonicalizationError`] - the location string itself is malformed
//! - [`IdxvizError::FetchError`] - the repository could not be obtained
//! - [`IdxvizError::DecodeError`] - the repository was obtained but its index is unreadable
//! - [`IdxvizError::TreeConflict`] - a path is used both as a file and as a directory
//!
//! [`IdxvizError::CacheMismatch`] and [`IdxvizError::EvictionFailed`] are handled inside the
//! cache and only ever reach the logs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use idxviz_cli::core::{IdxvizError, user_friendly_error};
//!
//! let err = anyhow::Error::from(IdxvizError::TreeConflict { path: "lib".to_string() });
//! let ctx = user_friendly_error(err);
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Every failure kind produced by idxviz.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdxvizError {
    /// The repository location string could not be normalized.
    #[error("Invalid repository location '{location}': {reason}")]
    CanonicalizationError {
        /// The location as given by the caller
        location: String,
        /// Why it was rejected
        reason: String,
    },

    /// Cloning or opening the repository failed (network, auth, not found).
    #[error("Failed to fetch repository {location}")]
    FetchError {
        /// Canonical location that was being fetched
        location: String,
        /// Underlying failure reported by the source-control client
        reason: String,
    },

    /// A cached copy's recorded remote does not match the location it is cached under.
    #[error("Cached copy records remote '{found}' but '{expected}' was requested")]
    CacheMismatch {
        /// Canonical location the cache key was derived from
        expected: String,
        /// Remote identity recorded in the working copy
        found: String,
    },

    /// The index file is missing or malformed.
    #[error("Failed to decode index file {path}: {reason}")]
    DecodeError {
        /// Path of the index file
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// A path is a file in one entry and a directory prefix in another.
    #[error("Tree conflict: '{path}' is used both as a file and as a directory")]
    TreeConflict {
        /// The offending path, segments joined with `/`
        path: String,
    },

    /// A cache entry could not be removed during a sweep.
    #[error("Failed to evict cache entry {key}: {reason}")]
    EvictionFailed {
        /// Cache key of the entry
        key: String,
        /// Why removal failed
        reason: String,
    },

    /// A git command exited unsuccessfully.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand (e.g. `clone`, `config`)
        operation: String,
        /// Captured standard error
        stderr: String,
    },

    /// The `git` executable is not available.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// The directory is not a git working copy.
    #[error("Not a valid git repository: {path}")]
    NotARepository {
        /// Directory that was opened
        path: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// The cache directory is in an unusable state.
    #[error("Cache error: {message}")]
    CacheError {
        /// Description of the problem
        message: String,
    },
}

impl IdxvizError {
    /// Shorthand for a [`IdxvizError::CanonicalizationError`].
    pub fn invalid_location(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CanonicalizationError {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is about the requested location itself, as opposed to the cache.
    #[must_use]
    pub const fn is_location_error(&self) -> bool {
        matches!(
            self,
            Self::CanonicalizationError { .. }
                | Self::FetchError { .. }
                | Self::DecodeError { .. }
                | Self::TreeConflict { .. }
        )
    }
}

/// An [`IdxvizError`] with optional suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: IdxvizError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: IdxvizError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for the CLI.
///
/// Known [`IdxvizError`] kinds anywhere in the chain get a tailored suggestion. I/O errors
/// are mapped by kind, and everything else is reported as a generic cache error carrying
/// the full context chain as details.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(known) = error.chain().find_map(|e| e.downcast_ref::<IdxvizError>()) {
        let ctx = create_error_context(known.clone());
        // Keep outer context messages visible when the typed error sits deeper in the chain
        if ctx.details.is_none() && error.chain().count() > 1 {
            return ctx.with_details(format!("{error:#}"));
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(IdxvizError::CacheError {
                    message: "permission denied".to_string(),
                })
                .with_suggestion("Check ownership and permissions of the cache directory")
                .with_details(format!("{error:#}"));
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(IdxvizError::CacheError {
                    message: "file or directory not found".to_string(),
                })
                .with_suggestion("Check that the path exists and is spelled correctly")
                .with_details(format!("{error:#}"));
            }
            _ => {}
        }
    }

    ErrorContext::new(IdxvizError::CacheError {
        message: error.to_string(),
    })
    .with_details(format!("{error:#}"))
}

fn create_error_context(error: IdxvizError) -> ErrorContext {
    match &error {
        IdxvizError::CanonicalizationError { .. } => ErrorContext::new(error)
            .with_suggestion("Use a repository URL such as https://github.com/owner/repo or an absolute local path"),

        IdxvizError::FetchError { location, reason } => {
            let details = reason.trim().to_string();
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Verify that {location} exists and is reachable. Check your network connection and credentials"
                ))
                .with_details(details)
        }

        IdxvizError::DecodeError { .. } => ErrorContext::new(error)
            .with_suggestion("The repository was fetched but its index is unreadable. Try 'idxviz cache clear' and run again")
            .with_details("Supported index versions are 2, 3 and 4"),

        IdxvizError::TreeConflict { path } => {
            let details = format!("'{path}' appears as a file and as a parent directory in different index entries");
            ErrorContext::new(error.clone())
                .with_suggestion("The index is inconsistent. Re-create it with 'git read-tree HEAD' in the repository")
                .with_details(details)
        }

        IdxvizError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ or your package manager (e.g., 'brew install git', 'apt install git')")
            .with_details("idxviz uses the system git command to clone repositories"),

        IdxvizError::GitCommandError { stderr, .. } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error.clone())
                .with_suggestion("Try running the git command manually for more details")
                .with_details(details)
        }

        IdxvizError::NotARepository { .. } => ErrorContext::new(error)
            .with_suggestion("Point idxviz at a git repository URL or a directory containing a .git folder"),

        IdxvizError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check ~/.idxviz/config.toml and the command-line options"),

        IdxvizError::CacheError { .. }
        | IdxvizError::CacheMismatch { .. }
        | IdxvizError::EvictionFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'idxviz cache clear' to reset the cache"),
    }
}
