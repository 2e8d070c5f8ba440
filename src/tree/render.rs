//! ASCII rendering of a [`TreeNode`].
//!
//! ```text
//! repo
//! ├── src
//! │   ├── a.txt (10 bytes)
//! │   └── b
//! │       └── c.txt (20 bytes)
//! └── README.md (5 bytes)
//! ```

use super::TreeNode;
use std::fmt::Write;

/// Render `tree` with box-drawing connectors.
///
/// Files with a non-zero size get a ` (N bytes)` suffix. With `max_depth`, nodes deeper
/// than that many levels below the root are left out.
#[must_use]
pub fn render_tree(tree: &TreeNode, max_depth: Option<usize>) -> String {
    let mut out = String::new();
    out.push_str(&tree.name);
    out.push('\n');
    render_children(tree, "", 1, max_depth, &mut out);
    out
}

fn render_children(node: &TreeNode, prefix: &str, depth: usize, max_depth: Option<usize>, out: &mut String) {
    if max_depth.is_some_and(|max| depth > max) {
        return;
    }

    let children = node.children();
    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let connector = if is_last { "└── " } else { "├── " };
        let _ = writeln!(out, "{prefix}{connector}{}", label(child));

        if child.is_dir() {
            let child_prefix = if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };
            render_children(child, &child_prefix, depth + 1, max_depth, out);
        }
    }
}

/// Display label of one node: its name, plus the size for sized files.
#[must_use]
pub fn label(node: &TreeNode) -> String {
    if node.is_file() && node.size > 0 {
        format!("{} ({} bytes)", node.name, node.size)
    } else {
        node.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use crate::tree::TreeBuilder;

    fn sample() -> TreeNode {
        TreeBuilder::new("repo")
            .build(&[
                IndexEntry::new("src/a.txt", 10),
                IndexEntry::new("src/b/c.txt", 20),
                IndexEntry::new("README.md", 5),
                IndexEntry::new("empty", 0),
            ])
            .unwrap()
    }

    #[test]
    fn test_render_full_tree() {
        let expected = "\
repo
├── src
│   ├── a.txt (10 bytes)
│   └── b
│       └── c.txt (20 bytes)
├── README.md (5 bytes)
└── empty
";
        assert_eq!(render_tree(&sample(), None), expected);
    }

    #[test]
    fn test_render_depth_limit() {
        let expected = "\
repo
├── src
│   ├── a.txt (10 bytes)
│   └── b
├── README.md (5 bytes)
└── empty
";
        assert_eq!(render_tree(&sample(), Some(2)), expected);
    }

    #[test]
    fn test_render_root_only() {
        assert_eq!(render_tree(&sample(), Some(0)), "repo\n");
    }
}
