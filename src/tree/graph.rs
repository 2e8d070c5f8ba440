//! Depth-limited graph view of a [`TreeNode`] for visualization.
//!
//! The view starts with every node down to `max_depth` levels below the root. Nodes can
//! then be expanded (children added) or collapsed (descendants removed) one at a time.
//! Graph nodes are identified by their petgraph index, which stays stable while other
//! nodes are removed, and carry their full path for display.

use super::TreeNode;
use petgraph::Direction;
use petgraph::dot::{Config, Dot};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Bfs;
use std::collections::HashMap;

const FILE_COLOR: &str = "#FF9999";
const DIRECTORY_COLOR: &str = "#99CCFF";

/// A tree node as shown in the graph.
#[derive(Debug, Clone)]
pub struct GraphNode<'a> {
    pub node: &'a TreeNode,
    /// `/` separated path from the root; empty for the root itself.
    pub path: String,
    /// Whether this node's children are in the graph.
    pub expanded: bool,
}

#[derive(Debug)]
pub struct TreeGraph<'a> {
    graph: StableDiGraph<GraphNode<'a>, ()>,
    root: NodeIndex,
    by_path: HashMap<String, NodeIndex>,
}

impl<'a> TreeGraph<'a> {
    /// Build the view with nodes at most `max_depth` levels below the root.
    #[must_use]
    pub fn new(tree: &'a TreeNode, max_depth: usize) -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(GraphNode {
            node: tree,
            path: String::new(),
            expanded: false,
        });
        let mut view = Self {
            graph,
            root,
            by_path: HashMap::from([(String::new(), root)]),
        };
        view.add_levels(root, max_depth);
        view
    }

    fn add_levels(&mut self, id: NodeIndex, levels: usize) {
        if levels == 0 {
            return;
        }
        for child in self.expand_one(id) {
            self.add_levels(child, levels - 1);
        }
    }

    /// Add the direct children of `id` that are not shown yet. Returns the new node ids.
    fn expand_one(&mut self, id: NodeIndex) -> Vec<NodeIndex> {
        let Some(parent) = self.graph.node_weight_mut(id) else {
            return Vec::new();
        };
        parent.expanded = true;
        let tree_node = parent.node;
        let parent_path = parent.path.clone();

        let mut added = Vec::new();
        for child in tree_node.children() {
            let path = if parent_path.is_empty() {
                child.name.clone()
            } else {
                format!("{parent_path}/{}", child.name)
            };
            if self.by_path.contains_key(&path) {
                continue;
            }
            let child_id = self.graph.add_node(GraphNode {
                node: child,
                path: path.clone(),
                expanded: false,
            });
            self.graph.add_edge(id, child_id, ());
            self.by_path.insert(path, child_id);
            added.push(child_id);
        }
        added
    }

    #[must_use]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn node(&self, id: NodeIndex) -> Option<&GraphNode<'a>> {
        self.graph.node_weight(id)
    }

    /// Id of the node at `path`, if it is currently shown.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<NodeIndex> {
        self.by_path.get(path.trim_matches('/')).copied()
    }

    /// Shown children of `id`, in tree order.
    #[must_use]
    pub fn children(&self, id: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<_> = self.graph.neighbors_directed(id, Direction::Outgoing).collect();
        children.sort();
        children
    }

    /// Show the direct children of `id`. Returns how many nodes were added.
    pub fn expand(&mut self, id: NodeIndex) -> usize {
        self.expand_one(id).len()
    }

    /// Remove everything below `id`. Returns how many nodes were removed.
    pub fn collapse(&mut self, id: NodeIndex) -> usize {
        if self.graph.node_weight(id).is_none() {
            return 0;
        }

        let mut below = Vec::new();
        let mut bfs = Bfs::new(&self.graph, id);
        while let Some(next) = bfs.next(&self.graph) {
            if next != id {
                below.push(next);
            }
        }

        for node in &below {
            if let Some(removed) = self.graph.remove_node(*node) {
                self.by_path.remove(&removed.path);
            }
        }
        if let Some(weight) = self.graph.node_weight_mut(id) {
            weight.expanded = false;
        }
        below.len()
    }

    /// Graphviz DOT rendering: files are red ellipses, directories blue boxes.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, _edge| String::new(),
            &|_, (_, shown)| {
                let node = shown.node;
                let text = if node.is_file() && node.size > 0 {
                    format!("{}\n({} bytes)", node.name, node.size)
                } else {
                    node.name.clone()
                };
                let (shape, color) = if node.is_file() {
                    ("ellipse", FILE_COLOR)
                } else {
                    ("box", DIRECTORY_COLOR)
                };
                format!("label = {text:?}, shape = {shape}, style = filled, fillcolor = \"{color}\"")
            },
        );
        format!("{dot:?}")
    }

    /// Edges as `(parent path, child path)` pairs, for callers drawing the graph themselves.
    #[must_use]
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| {
                let (source, target) = self.graph.edge_endpoints(edge)?;
                let from = self.graph.node_weight(source)?;
                let to = self.graph.node_weight(target)?;
                Some((from.path.as_str(), to.path.as_str()))
            })
            .collect()
    }
}
