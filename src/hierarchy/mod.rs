//! Summary trees over a document.
//!
//! Level 0 holds the document's chunks. Each higher level holds one summary
//! per cluster of the level below, and the top level is a single root that
//! summarizes the whole document:
//!
//! ```text
//! L2            root
//!             /      \
//! L1      fruit       engines        summaries
//!        /  |  \     /   |
//! L0    c0  c1  c2 ─┘    c3          chunks (c2 sits in both clusters)
//! ```
//!
//! A chunk may belong to several clusters. Every node still has exactly one
//! primary parent (its most probable cluster); the other memberships are
//! kept in [`Tree::parents`].
//!
//! - [`TreeBuilder`] runs the cluster, summarize, embed loop.
//! - [`Tree`] is the finished read-only tree with JSON persistence.
//! - [`Tree::validate`] checks its structure.

mod builder;
mod node;
pub(crate) mod tree;
mod validate;

pub use builder::{BuildOutput, BuildReport, BuilderConfig, TreeBuilder};
pub use node::{Node, NodeContent, NodeId};
pub use tree::{Tree, FORMAT_VERSION};
pub use validate::{Severity, ValidationIssue, ValidationReport};
