//! Hierarchical file tree built from flat index entries.
//!
//! [`TreeBuilder`] turns `{name, size}` entries into a [`TreeNode`] hierarchy: every
//! intermediate path segment becomes a [`NodeKind::Directory`], every final segment a
//! [`NodeKind::File`]. Directories always carry size 0; [`TreeNode::total_size`] computes
//! the aggregate on demand.
//!
//! ```
//! use idxviz_cli::index::IndexEntry;
//! use idxviz_cli::tree::build_tree;
//!
//! let tree = build_tree(&[
//!     IndexEntry::new("src/a.txt", 10),
//!     IndexEntry::new("src/b/c.txt", 20),
//!     IndexEntry::new("README.md", 5),
//! ])
//! .unwrap();
//!
//! assert_eq!(tree.get("src/b/c.txt").unwrap().size, 20);
//! assert_eq!(tree.total_size(), 35);
//! ```
//!
//! Presentation lives in [`render`] (ASCII) and [`graph`] (depth-limited graph, DOT).

pub mod graph;
pub mod render;

use crate::core::IdxvizError;
use crate::index::IndexEntry;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Name of the root node when the repository name is unknown.
pub const DEFAULT_ROOT_NAME: &str = "root";

const SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
        }
    }
}

/// One file or directory. Children keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    /// Recorded size for files, 0 for directories.
    pub size: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TreeNode {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            size: 0,
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            size,
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[must_use]
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.index.get(name).map(|&i| &self.children[i])
    }

    /// Look up a `/` separated path below this node. The empty path is this node.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        path.split(SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Sum of all file sizes below (and including) this node.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size + self.children.iter().map(TreeNode::total_size).sum::<u64>()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        if self.is_file() {
            1
        } else {
            self.children.iter().map(TreeNode::file_count).sum()
        }
    }

    #[must_use]
    pub fn directory_count(&self) -> usize {
        if self.is_file() {
            0
        } else {
            1 + self.children.iter().map(TreeNode::directory_count).sum::<usize>()
        }
    }

    /// Paths of all files below this node, relative to it, in depth-first order.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for child in &self.children {
            child.collect_leaf_paths("", &mut paths);
        }
        paths
    }

    fn collect_leaf_paths(&self, prefix: &str, out: &mut Vec<String>) {
        let path = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}{SEPARATOR}{}", self.name)
        };
        if self.is_file() {
            out.push(path);
        } else {
            for child in &self.children {
                child.collect_leaf_paths(&path, out);
            }
        }
    }

    /// Copy of this node without anything more than `max_depth` levels below it.
    #[must_use]
    pub fn truncated(&self, max_depth: usize) -> TreeNode {
        let mut copy = Self {
            name: self.name.clone(),
            kind: self.kind,
            size: self.size,
            children: Vec::new(),
            index: HashMap::new(),
        };
        if max_depth > 0 {
            for child in &self.children {
                copy.push_child(child.truncated(max_depth - 1));
            }
        }
        copy
    }

    fn push_child(&mut self, child: TreeNode) -> usize {
        let position = self.children.len();
        self.index.insert(child.name.clone(), position);
        self.children.push(child);
        position
    }
}

/// Builds a [`TreeNode`] hierarchy from index entries.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    root_name: String,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_NAME)
    }
}

impl TreeBuilder {
    /// `root_name` labels the root directory; an empty name falls back to
    /// [`DEFAULT_ROOT_NAME`].
    pub fn new(root_name: impl Into<String>) -> Self {
        let root_name = root_name.into();
        Self {
            root_name: if root_name.is_empty() {
                DEFAULT_ROOT_NAME.to_string()
            } else {
                root_name
            },
        }
    }

    /// Build the tree in input order.
    ///
    /// A repeated file path keeps its first position and takes the last size. Entries with
    /// an empty name or an empty, `.` or `..` segment are skipped.
    ///
    /// # Errors
    ///
    /// [`IdxvizError::TreeConflict`] when a path is both a file and a directory prefix.
    /// No partial tree is returned.
    pub fn build(&self, entries: &[IndexEntry]) -> Result<TreeNode, IdxvizError> {
        let mut root = TreeNode::directory(self.root_name.clone());
        for entry in entries {
            insert(&mut root, entry)?;
        }
        Ok(root)
    }
}

/// [`TreeBuilder::build`] with the default root name.
pub fn build_tree(entries: &[IndexEntry]) -> Result<TreeNode, IdxvizError> {
    TreeBuilder::default().build(entries)
}

fn insert(root: &mut TreeNode, entry: &IndexEntry) -> Result<(), IdxvizError> {
    let segments: Vec<&str> = entry.name.split(SEPARATOR).collect();
    if entry.name.is_empty() || segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        warn!("Skipping index entry with unusable path {:?}", entry.name);
        return Ok(());
    }

    let conflict = |depth: usize| IdxvizError::TreeConflict {
        path: segments[..=depth].join("/"),
    };

    let last = segments.len() - 1;
    let mut node = root;
    for (depth, segment) in segments.iter().enumerate() {
        let existing = node.index.get(*segment).copied();
        match existing {
            Some(position) if depth == last => {
                let child = &mut node.children[position];
                if child.is_dir() {
                    return Err(conflict(depth));
                }
                child.size = entry.size;
            }
            Some(position) => {
                if node.children[position].is_file() {
                    return Err(conflict(depth));
                }
                node = &mut node.children[position];
            }
            None if depth == last => {
                node.push_child(TreeNode::file(*segment, entry.size));
            }
            None => {
                let position = node.push_child(TreeNode::directory(*segment));
                node = &mut node.children[position];
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(list: &[(&str, u64)]) -> Vec<IndexEntry> {
        list.iter().map(|(name, size)| IndexEntry::new(*name, *size)).collect()
    }

    fn child_names(node: &TreeNode) -> Vec<&str> {
        node.children().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_builds_nested_directories() {
        let tree = build_tree(&entries(&[("src/a.txt", 10), ("src/b/c.txt", 20), ("README.md", 5)])).unwrap();

        assert_eq!(tree.name, "root");
        assert!(tree.is_dir());
        assert_eq!(child_names(&tree), vec!["src", "README.md"]);

        let src = tree.child("src").unwrap();
        assert!(src.is_dir());
        assert_eq!(src.size, 0);
        assert_eq!(child_names(src), vec!["a.txt", "b"]);
        assert_eq!(src.child("a.txt").unwrap(), &TreeNode::file("a.txt", 10));

        let b = src.child("b").unwrap();
        assert!(b.is_dir());
        assert_eq!(b.size, 0);
        assert_eq!(b.child("c.txt").unwrap().size, 20);

        let readme = tree.child("README.md").unwrap();
        assert!(readme.is_file());
        assert_eq!(readme.size, 5);
    }

    #[test]
    fn test_file_then_directory_conflict() {
        let err = build_tree(&entries(&[("lib", 0), ("lib/x.txt", 1)])).unwrap_err();
        assert_eq!(err, IdxvizError::TreeConflict { path: "lib".to_string() });
    }

    #[test]
    fn test_directory_then_file_conflict() {
        let err = build_tree(&entries(&[("a/b/c", 1), ("a/b", 2)])).unwrap_err();
        assert_eq!(err, IdxvizError::TreeConflict { path: "a/b".to_string() });
    }

    #[test]
    fn test_nested_conflict_names_full_prefix() {
        let err = build_tree(&entries(&[("x/y", 1), ("x/y/z/w", 2)])).unwrap_err();
        assert!(err.to_string().contains("'x/y'"));
    }

    #[test]
    fn test_empty_entries_yield_lone_root() {
        let tree = build_tree(&[]).unwrap();
        assert!(tree.is_dir());
        assert!(tree.children().is_empty());
        assert_eq!(tree.file_count(), 0);
        assert_eq!(tree.directory_count(), 1);
    }

    #[test]
    fn test_duplicate_file_takes_last_size() {
        let tree = build_tree(&entries(&[("a.txt", 1), ("b.txt", 2), ("a.txt", 3)])).unwrap();
        assert_eq!(child_names(&tree), vec!["a.txt", "b.txt"]);
        assert_eq!(tree.child("a.txt").unwrap().size, 3);
    }

    #[test]
    fn test_unusable_paths_are_skipped() {
        let tree = build_tree(&entries(&[
            ("", 1),
            ("a//b", 1),
            ("/abs", 1),
            ("trailing/", 1),
            ("./dot", 1),
            ("up/../x", 1),
            ("ok.txt", 4),
        ]))
        .unwrap();
        assert_eq!(tree.leaf_paths(), vec!["ok.txt"]);
    }

    #[test]
    fn test_leaf_paths_round_trip_names() {
        let input = entries(&[("docs/guide/intro.md", 3), ("docs/index.md", 1), ("Cargo.toml", 7), ("src/main.rs", 9)]);
        let tree = build_tree(&input).unwrap();

        let mut leaves = tree.leaf_paths();
        let mut names: Vec<String> = input.iter().map(|e| e.name.clone()).collect();
        leaves.sort();
        names.sort();
        assert_eq!(leaves, names);
    }

    #[test]
    fn test_derived_counts_and_lookup() {
        let tree = TreeBuilder::new("repo")
            .build(&entries(&[("a/b/c.txt", 5), ("a/d.txt", 7), ("e.txt", 1)]))
            .unwrap();

        assert_eq!(tree.name, "repo");
        assert_eq!(tree.total_size(), 13);
        assert_eq!(tree.get("a").unwrap().total_size(), 12);
        assert_eq!(tree.file_count(), 3);
        assert_eq!(tree.directory_count(), 3);
        assert_eq!(tree.get("").unwrap().name, "repo");
        assert_eq!(tree.get("a/b/c.txt").unwrap().size, 5);
        assert!(tree.get("a/missing").is_none());
        assert!(tree.get("e.txt/more").is_none());
    }

    #[test]
    fn test_truncated_copy() {
        let tree = TreeBuilder::new("repo")
            .build(&entries(&[("a/b/c.txt", 5), ("a/d.txt", 7), ("e.txt", 1)]))
            .unwrap();

        let shallow = tree.truncated(1);
        assert_eq!(shallow.children().len(), 2);
        assert!(shallow.get("a").unwrap().children().is_empty());
        assert_eq!(shallow.get("e.txt").unwrap().size, 1);

        let two = tree.truncated(2);
        assert!(two.get("a/d.txt").is_some());
        assert!(two.get("a/b").unwrap().children().is_empty());
        assert_eq!(tree.truncated(9), tree);
    }

    #[test]
    fn test_empty_root_name_falls_back() {
        let tree = TreeBuilder::new("").build(&[]).unwrap();
        assert_eq!(tree.name, DEFAULT_ROOT_NAME);
    }

    #[test]
    fn test_json_shape() {
        let tree = build_tree(&entries(&[("d/f", 2)])).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "root",
                "kind": "directory",
                "size": 0,
                "children": [{
                    "name": "d",
                    "kind": "directory",
                    "size": 0,
                    "children": [{"name": "f", "kind": "file", "size": 2}]
                }]
            })
        );
    }
}
