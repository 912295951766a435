//! Tree nodes.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::segment::Chunk;

/// Identifier of a node within one tree.
///
/// Ids are dense and assigned in creation order: leaves first, then each
/// summary level in cluster order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position of the node in the tree's node table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        // Trees never approach u32::MAX nodes; the builder checks.
        Self(index as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content of a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeContent {
    /// Leaf node holding an original chunk.
    Leaf(Chunk),
    /// Internal node holding a summary of its children.
    Summary {
        /// Summary text.
        text: String,
        /// True when the model failed and the text is an extractive fallback.
        degraded: bool,
    },
}

/// A node in a retrieval tree.
///
/// Nodes are immutable once built. Parent links live in the tree's
/// adjacency index, not on the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: NodeId,
    /// Level in the tree (0 = leaves).
    pub level: usize,
    /// The content at this node.
    pub content: NodeContent,
    /// Embedding of this node's own text.
    pub embedding: Vec<f32>,
    /// Child node ids, ascending (empty for leaves).
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create a new leaf node.
    pub fn leaf(id: NodeId, chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id,
            level: 0,
            content: NodeContent::Leaf(chunk),
            embedding,
            children: Vec::new(),
        }
    }

    /// Create a new internal (summary) node.
    pub fn summary(
        id: NodeId,
        level: usize,
        text: String,
        degraded: bool,
        mut children: Vec<NodeId>,
        embedding: Vec<f32>,
    ) -> Self {
        children.sort_unstable();
        children.dedup();
        Self {
            id,
            level,
            content: NodeContent::Summary { text, degraded },
            embedding,
            children,
        }
    }

    /// Text the node stands for.
    pub fn text(&self) -> &str {
        match &self.content {
            NodeContent::Leaf(chunk) => &chunk.text,
            NodeContent::Summary { text, .. } => text,
        }
    }

    /// Check if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    /// Get the chunk if this is a leaf node.
    pub fn as_leaf(&self) -> Option<&Chunk> {
        match &self.content {
            NodeContent::Leaf(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Whether the summary is an extractive fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(self.content, NodeContent::Summary { degraded: true, .. })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            NodeContent::Leaf(_) => write!(f, "Leaf[{}]: {}", self.id, self.text()),
            NodeContent::Summary { text, .. } => {
                write!(f, "Node[{}] L{}: {}", self.id, self.level, text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            id: 0,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            source_offset: 0,
            overlap_bytes: 0,
        }
    }

    #[test]
    fn test_summary_children_are_sorted_and_unique() {
        let node = Node::summary(
            NodeId(9),
            1,
            "s".into(),
            false,
            vec![NodeId(3), NodeId(1), NodeId(3)],
            vec![1.0],
        );
        assert_eq!(node.children, vec![NodeId(1), NodeId(3)]);
        assert!(!node.is_leaf());
        assert!(!node.is_degraded());
    }

    #[test]
    fn test_display() {
        let leaf = Node::leaf(NodeId(0), chunk("hello world"), vec![1.0]);
        assert_eq!(leaf.to_string(), "Leaf[#0]: hello world");
        let inner = Node::summary(NodeId(4), 2, "gist".into(), true, vec![NodeId(0)], vec![1.0]);
        assert_eq!(inner.to_string(), "Node[#4] L2: gist");
        assert!(inner.is_degraded());
    }
}
