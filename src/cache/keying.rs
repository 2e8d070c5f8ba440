//! Canonical repository locations and the cache keys derived from them.
//!
//! Many strings name the same repository: `https://github.com/o/r`,
//! `https://github.com/o/r.git`, `https://github.com/o/r/tree/main/src`. [`canonicalize`]
//! maps all of them to one [`CanonicalLocation`], and [`key_for`] hashes that string into
//! the [`CacheKey`] used as the on-disk directory name.
//!
//! Normalization, in order:
//! 1. trim surrounding whitespace and trailing `/`
//! 2. strip a trailing `.git`
//! 3. truncate at a browse-at-ref marker (`/tree/<ref>`, `/blob/<ref>`, GitLab's
//!    `/-/tree/<ref>`, Bitbucket's `/src/<ref>`) when it follows an owner/repo pair
//! 4. re-append `.git`
//!
//! Steps 2-4 only apply to remote forms (`scheme://...` or scp-like `user@host:path`).
//! Absolute local paths are used verbatim because `/srv/repo` and `/srv/repo.git` are
//! different directories.
//!
//! ```rust
//! use idxviz_cli::cache::keying::{canonicalize, key_for};
//!
//! let a = canonicalize("https://github.com/owner/repo").unwrap();
//! let b = canonicalize("https://github.com/owner/repo.git").unwrap();
//! let c = canonicalize("https://github.com/owner/repo/tree/master").unwrap();
//! assert_eq!(a.as_str(), "https://github.com/owner/repo.git");
//! assert_eq!(a, b);
//! assert_eq!(key_for(&a), key_for(&c));
//! ```

use crate::core::IdxvizError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const ARCHIVE_SUFFIX: &str = ".git";

/// Path markers that introduce a "browse at ref" sub-path on common hosting services.
const BROWSE_MARKERS: &[&str] = &["/-/tree/", "/-/blob/", "/tree/", "/blob/", "/src/"];

/// The normalized form of a repository address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalLocation(String);

impl CanonicalLocation {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment without the archive suffix, e.g. `repo` for
    /// `https://github.com/owner/repo.git`.
    #[must_use]
    pub fn repository_name(&self) -> &str {
        let trimmed = self.0.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(&self.0);
        let name = trimmed
            .rsplit(['/', '\\', ':'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(trimmed);
        if name.is_empty() { "root" } else { name }
    }

    /// Whether this location refers to something on the local file system.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !is_remote(&self.0)
    }
}

impl fmt::Display for CanonicalLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalLocation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stable storage key for a [`CanonicalLocation`]: lowercase hex SHA-256 of the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of a key in hex characters.
    pub const LEN: usize = 64;

    /// Accept a string only if it has the exact shape of a key.
    ///
    /// Used when scanning the cache directory so that foreign names are ignored.
    #[must_use]
    pub fn parse(candidate: &str) -> Option<Self> {
        let well_formed = candidate.len() == Self::LEN
            && candidate.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(candidate.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a repository location. Idempotent.
pub fn canonicalize(location: &str) -> Result<CanonicalLocation, IdxvizError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(IdxvizError::invalid_location(location, "location is empty"));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdxvizError::invalid_location(
            location,
            "location contains whitespace or control characters",
        ));
    }

    if !is_remote(trimmed) {
        return canonicalize_local(location, trimmed);
    }

    let (prefix, path) = split_remote(trimmed);
    let mut path = path.trim_end_matches('/');
    path = path.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(path);
    path = truncate_browse_suffix(path).trim_end_matches('/');
    let path = path.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(path);

    if path.trim_matches('/').is_empty() {
        return Err(IdxvizError::invalid_location(location, "no repository path"));
    }

    Ok(CanonicalLocation(format!("{prefix}{path}{ARCHIVE_SUFFIX}")))
}

/// Derive the cache key of a canonical location.
#[must_use]
pub fn key_for(location: &CanonicalLocation) -> CacheKey {
    let digest = Sha256::digest(location.as_str().as_bytes());
    CacheKey(hex::encode(digest))
}

fn canonicalize_local(original: &str, trimmed: &str) -> Result<CanonicalLocation, IdxvizError> {
    let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
    let is_absolute = path.starts_with('/') || looks_like_windows_absolute(path);
    if !is_absolute {
        return Err(IdxvizError::invalid_location(
            original,
            "relative local paths are not supported; use an absolute path or a URL",
        ));
    }

    let stripped = trimmed.trim_end_matches(['/', '\\']);
    if stripped.is_empty() || stripped == "file:" {
        return Err(IdxvizError::invalid_location(original, "no repository path"));
    }
    Ok(CanonicalLocation(stripped.to_string()))
}

/// Remote forms are `scheme://host/...` (except `file://`) and scp-like `user@host:path`.
fn is_remote(location: &str) -> bool {
    if let Some((scheme, _)) = location.split_once("://") {
        return scheme != "file" && !scheme.is_empty();
    }
    is_scp_like(location)
}

fn is_scp_like(location: &str) -> bool {
    match (location.find('@'), location.find(':')) {
        (Some(at), Some(colon)) => at < colon && !location[..colon].contains('/'),
        _ => false,
    }
}

fn looks_like_windows_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/')
}

/// Split a remote location into the part before the repository path and the path itself.
///
/// `https://github.com/o/r` becomes (`https://github.com/`, `o/r`), and
/// `git@github.com:o/r` becomes (`git@github.com:`, `o/r`).
fn split_remote(location: &str) -> (&str, &str) {
    if let Some(scheme_end) = location.find("://") {
        let after_scheme = scheme_end + 3;
        match location[after_scheme..].find('/') {
            Some(slash) => location.split_at(after_scheme + slash + 1),
            None => (location, ""),
        }
    } else {
        match location.find(':') {
            Some(colon) => location.split_at(colon + 1),
            None => (location, ""),
        }
    }
}

/// Cut a browse-at-ref suffix at the earliest marker preceded by at least `owner/repo`.
///
/// The cut prefix holds no qualifying marker, so cutting again changes nothing.
fn truncate_browse_suffix(path: &str) -> &str {
    let slashed = format!("/{path}");
    let earliest = BROWSE_MARKERS
        .iter()
        .filter_map(|marker| first_qualifying_marker(&slashed, marker))
        .min();
    match earliest {
        Some(at) => &path[..at - 1],
        None => path,
    }
}

/// Position in `slashed` of the first `marker` with two or more path segments before it.
fn first_qualifying_marker(slashed: &str, marker: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(found) = slashed[search_from..].find(marker) {
        let at = search_from + found;
        let before = &slashed[1..at.max(1)];
        if before.split('/').filter(|s| !s.is_empty()).count() >= 2 {
            return Some(at);
        }
        search_from = at + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(s: &str) -> String {
        canonicalize(s).unwrap().as_str().to_string()
    }

    #[test]
    fn test_equivalent_forms_share_canonical_string() {
        let expected = "https://github.com/owner/repo.git";
        for input in [
            "https://github.com/owner/repo",
            "https://github.com/owner/repo.git",
            "https://github.com/owner/repo/",
            "https://github.com/owner/repo.git/",
            "https://github.com/owner/repo/tree/master",
            "https://github.com/owner/repo/tree/main/src/lib",
            "https://github.com/owner/repo/blob/main/README.md",
            "  https://github.com/owner/repo  ",
        ] {
            assert_eq!(canon(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_gitlab_and_bitbucket_browse_markers() {
        assert_eq!(
            canon("https://gitlab.com/group/project/-/tree/main"),
            "https://gitlab.com/group/project.git"
        );
        assert_eq!(
            canon("https://bitbucket.org/team/repo/src/master/docs"),
            "https://bitbucket.org/team/repo.git"
        );
    }

    #[test]
    fn test_marker_inside_repository_path_is_kept() {
        // A repository literally named "tree" is not a browse suffix
        assert_eq!(
            canon("https://github.com/owner/tree"),
            "https://github.com/owner/tree.git"
        );
        assert_eq!(
            canon("https://github.com/tree/src"),
            "https://github.com/tree/src.git"
        );
    }

    #[test]
    fn test_earliest_browse_marker_wins() {
        for input in [
            "https://github.com/owner/repo/src/x/tree/main",
            "https://github.com/owner/repo/blob/main/tree/y",
            "https://github.com/owner/repo/tree/main/src/blob/z.rs",
            "https://gitlab.com/owner/repo/-/blob/main/tree/docs",
        ] {
            let expected = if input.contains("gitlab") {
                "https://gitlab.com/owner/repo.git"
            } else {
                "https://github.com/owner/repo.git"
            };
            assert_eq!(canon(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for input in [
            "https://github.com/owner/repo/tree/master",
            "https://github.com/owner/repo/src/x/tree/main",
            "https://github.com/owner/repo/blob/main/tree/y",
            "git@github.com:owner/repo",
            "ssh://git@example.com:2222/team/repo.git",
            "file:///srv/git/repo.git",
            "/srv/git/repo",
            "https://gitlab.com/group/sub/project/-/blob/dev/x.rs",
        ] {
            let once = canonicalize(input).unwrap();
            let twice = canonicalize(once.as_str()).unwrap();
            assert_eq!(once, twice, "input: {input}");
        }
    }

    #[test]
    fn test_scp_like_locations() {
        assert_eq!(canon("git@github.com:owner/repo"), "git@github.com:owner/repo.git");
        assert_eq!(canon("git@github.com:owner/repo.git"), "git@github.com:owner/repo.git");
    }

    #[test]
    fn test_local_paths_are_verbatim() {
        assert_eq!(canon("/srv/git/repo/"), "/srv/git/repo");
        assert_eq!(canon("/srv/git/repo.git"), "/srv/git/repo.git");
        assert_eq!(canon("file:///srv/git/repo.git/"), "file:///srv/git/repo.git");
        assert!(canonicalize("/srv/git/repo").unwrap().is_local());
        assert!(!canonicalize("https://x.org/a/b").unwrap().is_local());
    }

    #[test]
    fn test_rejects_malformed_locations() {
        for input in [
            "",
            "   ",
            "https://github.com/owner/my repo",
            "relative/path",
            "./repo",
            "https://github.com",
            "https://github.com/",
            "https://github.com/.git",
            "/",
        ] {
            let err = canonicalize(input).unwrap_err();
            assert!(
                matches!(err, IdxvizError::CanonicalizationError { .. }),
                "input {input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_key_is_stable_and_distinct() {
        let a = canonicalize("https://github.com/owner/repo").unwrap();
        let b = canonicalize("https://github.com/owner/other").unwrap();
        let key_a = key_for(&a);

        assert_eq!(key_a, key_for(&a));
        assert_ne!(key_a, key_for(&b));
        assert_eq!(key_a.as_str().len(), CacheKey::LEN);
        // SHA-256 of the canonical string, computed independently
        assert_eq!(
            key_a.as_str(),
            hex::encode(Sha256::digest(b"https://github.com/owner/repo.git"))
        );
    }

    #[test]
    fn test_cache_key_parse() {
        let key = key_for(&canonicalize("https://github.com/o/r").unwrap());
        assert_eq!(CacheKey::parse(key.as_str()), Some(key.clone()));
        assert_eq!(key.short().len(), 8);
        assert!(CacheKey::parse(".entries").is_none());
        assert!(CacheKey::parse(&key.as_str().to_uppercase()).is_none());
        assert!(CacheKey::parse(&key.as_str()[..63]).is_none());
    }

    #[test]
    fn test_repository_name() {
        let loc = canonicalize("https://github.com/owner/repo/tree/main").unwrap();
        assert_eq!(loc.repository_name(), "repo");
        let loc = canonicalize("git@github.com:owner/project").unwrap();
        assert_eq!(loc.repository_name(), "project");
        let loc = canonicalize("/srv/git/local-repo/").unwrap();
        assert_eq!(loc.repository_name(), "local-repo");
    }
}
