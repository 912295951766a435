//! Structural checks for built trees.
//!
//! Detects the ways a tree can go wrong:
//! - more than one root, or a root that is not the declared one
//! - nodes unreachable from the root
//! - cycles through primary-parent links
//! - parent and child indexes that disagree
//! - level violations (a child at or above its parent's level)
//! - embeddings of inconsistent dimension
//!
//! ```rust,ignore
//! let report = tree.validate();
//! if !report.is_healthy() {
//!     for issue in &report.issues {
//!         eprintln!("{issue}");
//!     }
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::node::NodeId;
use super::tree::Tree;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A broken invariant.
    Error,
    /// The tree cannot be navigated.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single problem found by [`Tree::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Node involved, if any.
    pub node: Option<NodeId>,
}

impl ValidationIssue {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node: None,
        }
    }

    fn at(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = self.node {
            write!(f, " (node {id})")?;
        }
        Ok(())
    }
}

/// Outcome of [`Tree::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
    /// Nodes per level.
    pub level_sizes: Vec<usize>,
    /// Mean number of children over summary nodes.
    pub mean_fan_in: f64,
    /// Leaves that belong to more than one cluster.
    pub shared_nodes: usize,
}

impl ValidationReport {
    fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn error(&mut self, node: NodeId, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message).at(node));
    }

    /// No errors or critical issues.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// No issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues at or above `min`.
    pub fn issues_at_level(&self, min: Severity) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity >= min).collect()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "levels {:?}, mean fan-in {:.2}, {} shared node(s)",
            self.level_sizes, self.mean_fan_in, self.shared_nodes
        )?;
        if self.is_clean() {
            return write!(f, "no issues found");
        }
        let parts: Vec<String> = self
            .counts()
            .iter()
            .rev()
            .map(|(sev, n)| format!("{n} {sev}"))
            .collect();
        writeln!(f, "{}", parts.join(", "))?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}

impl Tree {
    /// Check every structural invariant of the tree.
    pub fn validate(&self) -> ValidationReport {
        let n = self.len();
        let mut report = ValidationReport {
            level_sizes: self.levels().iter().map(Vec::len).collect(),
            ..ValidationReport::default()
        };

        let primary: HashMap<usize, usize> = (0..n)
            .filter_map(|i| {
                self.parent(NodeId::from_index(i))
                    .map(|p| (i, p.index()))
            })
            .collect();
        let children: HashMap<usize, Vec<usize>> = self
            .iter()
            .filter(|node| !node.children.is_empty())
            .map(|node| {
                (
                    node.id.index(),
                    node.children.iter().map(|c| c.index()).collect(),
                )
            })
            .collect();
        let roots = check_primary_links(&primary, &children, n, &mut report);

        if roots != vec![self.root().index()] {
            report.add(ValidationIssue::new(
                Severity::Critical,
                format!("declared root {} but parentless nodes are {roots:?}", self.root()),
            ));
        }
        match self.levels().last() {
            Some(top) if top.len() == 1 && top[0] == self.root() => {}
            _ => report.add(ValidationIssue::new(
                Severity::Error,
                "top level does not consist of the root alone",
            )),
        }

        let mut placed = HashSet::new();
        for (level, ids) in self.levels().iter().enumerate() {
            for &id in ids {
                if !placed.insert(id) {
                    report.error(id, "node listed at more than one level");
                }
                match self.node(id) {
                    Some(node) if node.level != level => report.error(
                        id,
                        format!("listed at level {level} but node says {}", node.level),
                    ),
                    Some(_) => {}
                    None => report.error(id, "level index lists a missing node"),
                }
            }
        }
        if placed.len() != n {
            report.add(ValidationIssue::new(
                Severity::Error,
                format!("{} node(s) missing from the level index", n - placed.len()),
            ));
        }

        let dimension = self.root_node().embedding.len();
        let mut fan_in = Vec::new();
        for node in self.iter() {
            if node.embedding.len() != dimension || dimension == 0 {
                report.error(
                    node.id,
                    format!("embedding has {} dims, root has {dimension}", node.embedding.len()),
                );
            }
            if node.level == 0 {
                if !node.is_leaf() {
                    report.error(node.id, "level 0 node is not a leaf");
                }
                if !node.children.is_empty() {
                    report.error(node.id, "leaf node has children");
                }
            } else {
                if node.is_leaf() {
                    report.error(node.id, "summary level holds a leaf");
                }
                if node.children.is_empty() {
                    report.error(node.id, "summary node has no children");
                }
                fan_in.push(node.children.len());
                for &child in &node.children {
                    let Some(c) = self.node(child) else {
                        report.error(node.id, format!("child {child} does not exist"));
                        continue;
                    };
                    if c.level >= node.level {
                        report.error(
                            node.id,
                            format!("child {child} at level {} is not below {}", c.level, node.level),
                        );
                    } else if c.level + 1 != node.level {
                        report.add(
                            ValidationIssue::new(
                                Severity::Warning,
                                format!("child {child} skips a level"),
                            )
                            .at(node.id),
                        );
                    }
                }
            }

            let parents = self.parents(node.id);
            if parents.len() > 1 {
                report.shared_nodes += 1;
            }
            for &p in parents {
                if !self.children(p).contains(&node.id) {
                    report.error(node.id, format!("parent {p} does not list this node"));
                }
            }
        }
        if !fan_in.is_empty() {
            report.mean_fan_in = fan_in.iter().sum::<usize>() as f64 / fan_in.len() as f64;
        }

        for pair in report.level_sizes.clone().windows(2) {
            if pair[1] >= pair[0] && pair[0] > 1 {
                report.add(ValidationIssue::new(
                    Severity::Warning,
                    format!("level did not shrink ({} -> {})", pair[0], pair[1]),
                ));
            }
        }

        report
    }
}

/// Check that primary-parent links form a single rooted tree.
///
/// Returns the parentless nodes, ascending.
fn check_primary_links(
    parents: &HashMap<usize, usize>,
    children: &HashMap<usize, Vec<usize>>,
    node_count: usize,
    report: &mut ValidationReport,
) -> Vec<usize> {
    let roots: Vec<usize> = (0..node_count).filter(|i| !parents.contains_key(i)).collect();
    if roots.is_empty() {
        report.add(ValidationIssue::new(
            Severity::Critical,
            "no root node found: primary links form a cycle",
        ));
    } else if roots.len() > 1 {
        report.add(ValidationIssue::new(
            Severity::Critical,
            format!("multiple roots found: {roots:?}"),
        ));
    }

    let mut reachable = HashSet::new();
    let mut stack = roots.clone();
    while let Some(node) = stack.pop() {
        if reachable.insert(node) {
            if let Some(kids) = children.get(&node) {
                stack.extend(kids.iter().filter(|&&k| parents.get(&k) == Some(&node)));
            }
        }
    }
    let orphans: Vec<usize> = (0..node_count).filter(|i| !reachable.contains(i)).collect();
    if !orphans.is_empty() {
        report.add(ValidationIssue::new(
            Severity::Error,
            format!(
                "{} node(s) not reachable from the root, first few: {:?}",
                orphans.len(),
                &orphans[..orphans.len().min(5)]
            ),
        ));
    }

    for (&child, &parent) in parents {
        let listed = children.get(&parent).is_some_and(|kids| kids.contains(&child));
        if !listed {
            report.error(
                NodeId::from_index(child),
                format!("primary parent #{parent} does not list this node"),
            );
        }
    }

    // Walk up from every node; a walk longer than the node count loops.
    for start in 0..node_count {
        let mut current = start;
        let mut steps = 0;
        while let Some(&p) = parents.get(&current) {
            steps += 1;
            if steps > node_count {
                report.add(
                    ValidationIssue::new(Severity::Critical, "cycle through primary parents")
                        .at(NodeId::from_index(start)),
                );
                return roots;
            }
            current = p;
        }
    }

    roots
}
