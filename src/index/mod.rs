//! Reading a working copy's staged-file index.
//!
//! The tree builder only needs `{name, size}` pairs, so decoding sits behind the
//! [`IndexDecoder`] trait. [`GitIndexDecoder`] reads git's binary `.git/index`.

mod decoder;

pub use decoder::GitIndexDecoder;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One staged path and its recorded size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    /// `/` separated path relative to the repository root.
    pub name: String,
    pub size: u64,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Decodes an index file into flat entries.
///
/// Failures carry an [`IdxvizError::DecodeError`](crate::core::IdxvizError::DecodeError).
pub trait IndexDecoder: Send + Sync {
    fn decode(&self, index_path: &Path) -> Result<Vec<IndexEntry>>;
}
