//! The built retrieval tree and its persisted form.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::node::{Node, NodeId};
use crate::error::{Error, Result};

/// Persisted format version. Bumped on incompatible changes.
pub const FORMAT_VERSION: u32 = 1;

/// A multi-level summary tree over one document.
///
/// ```text
/// Level 2:            [root]
///                    /      \
/// Level 1:      [s4]          [s5]
///              /  |  \       /    \
/// Level 0:   [0] [1] [2]   [2]    [3]
/// ```
///
/// Soft clustering lets a node feed several parents (node 2 above). The
/// full membership is kept in an adjacency index (`child -> parents`);
/// the first entry of each list is the node's *primary* parent, the summary
/// of the cluster it most probably belongs to. Following primary parents
/// from any node reaches the root, so the primary links alone form a tree.
///
/// Read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    levels: Vec<Vec<NodeId>>,
    root: NodeId,
    /// `parents[i]`: parents of node i, primary first, rest ascending.
    parents: Vec<Vec<NodeId>>,
}

#[derive(Serialize, Deserialize)]
struct TreeRecord {
    format_version: u32,
    root: NodeId,
    levels: Vec<Vec<NodeId>>,
    primary_parents: Vec<Option<NodeId>>,
    nodes: Vec<Node>,
}

impl Tree {
    /// Assemble a tree from its node table.
    ///
    /// `primary_parents[i]` is the primary parent of node i (`None` only for
    /// the root). The secondary parents are derived from the children lists.
    pub fn from_parts(
        nodes: Vec<Node>,
        levels: Vec<Vec<NodeId>>,
        root: NodeId,
        primary_parents: Vec<Option<NodeId>>,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::EmptyInput);
        }
        if primary_parents.len() != nodes.len() {
            return Err(Error::Persistence(format!(
                "{} nodes but {} parent entries",
                nodes.len(),
                primary_parents.len()
            )));
        }
        for (i, node) in nodes.iter().enumerate() {
            if node.id.index() != i {
                return Err(Error::Persistence(format!(
                    "node {} stored at position {i}",
                    node.id
                )));
            }
        }
        let in_range = |id: NodeId| id.index() < nodes.len();
        if !in_range(root) {
            return Err(Error::Persistence(format!("root {root} does not exist")));
        }

        let mut parents: Vec<Vec<NodeId>> = primary_parents
            .iter()
            .map(|p| p.iter().copied().collect())
            .collect();
        for node in &nodes {
            for &child in &node.children {
                if !in_range(child) {
                    return Err(Error::Persistence(format!(
                        "node {} lists missing child {child}",
                        node.id
                    )));
                }
                let list = &mut parents[child.index()];
                if !list.contains(&node.id) {
                    list.push(node.id);
                }
            }
        }
        for list in &mut parents {
            if list.len() > 2 {
                list[1..].sort_unstable();
            }
        }

        Ok(Self {
            nodes,
            levels,
            root,
            parents,
        })
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Root node.
    pub fn root_node(&self) -> &Node {
        &self.nodes[self.root.index()]
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes, indexed by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Iterate over all nodes.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids per level (level 0 = leaves).
    pub fn levels(&self) -> &[Vec<NodeId>] {
        &self.levels
    }

    /// Node ids at one level.
    pub fn level(&self, level: usize) -> Option<&[NodeId]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    /// Number of levels, leaves included.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Leaf nodes in document order.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.levels
            .first()
            .into_iter()
            .flatten()
            .filter_map(|&id| self.node(id))
    }

    /// Primary parent of `id` (`None` for the root).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.index()).and_then(|p| p.first().copied())
    }

    /// Every parent of `id`, primary first.
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        self.parents.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Children of `id`.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Primary-parent chain from `id` up to the root, excluding `id`.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if out.contains(&parent) || out.len() > self.nodes.len() {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.root_node().embedding.len()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Deserialize from JSON produced by [`Tree::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let record: TreeRecord = serde_json::from_str(json)?;
        if record.format_version != FORMAT_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported tree format version {} (expected {FORMAT_VERSION})",
                record.format_version
            )));
        }
        Self::from_parts(
            record.nodes,
            record.levels,
            record.root,
            record.primary_parents,
        )
    }

    /// Write the tree to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a tree written by [`Tree::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn to_record(&self) -> TreeRecord {
        TreeRecord {
            format_version: FORMAT_VERSION,
            root: self.root,
            levels: self.levels.clone(),
            primary_parents: (0..self.nodes.len())
                .map(|i| self.parent(NodeId::from_index(i)))
                .collect(),
            nodes: self.nodes.clone(),
        }
    }
}
