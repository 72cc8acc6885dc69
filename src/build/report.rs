// src/build/report.rs

//! Per-node outcomes of one orchestrator run

use std::fmt;
use std::path::PathBuf;

/// What happened to one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// An installed record with an intact prefix already existed
    CacheHit,
    /// Built and installed during this run
    Installed,
    /// The build ran and failed, or the cached record was corrupt
    Failed { error: String },
    /// Skipped because a dependency failed
    NotAttempted { blocked_by: String },
}

impl NodeOutcome {
    /// Whether the node is usable afterwards
    pub fn is_success(&self) -> bool {
        matches!(self, Self::CacheHit | Self::Installed)
    }
}

impl fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit => write!(f, "cached"),
            Self::Installed => write!(f, "installed"),
            Self::Failed { error } => write!(f, "failed: {}", error),
            Self::NotAttempted { blocked_by } => write!(f, "not attempted (blocked by {})", blocked_by),
        }
    }
}

/// Outcome of one node together with where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub name: String,
    pub hash: String,
    pub prefix: PathBuf,
    pub outcome: NodeOutcome,
}

/// Result of building a DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub root: String,
    /// Nodes in topological order
    pub nodes: Vec<NodeReport>,
}

impl BuildReport {
    /// Whether every node is installed or cached
    pub fn success(&self) -> bool {
        self.nodes.iter().all(|n| n.outcome.is_success())
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn outcome(&self, name: &str) -> Option<&NodeOutcome> {
        self.node(name).map(|n| &n.outcome)
    }

    /// Nodes whose own build failed
    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.outcome, NodeOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&NodeOutcome) -> bool) -> usize {
        self.nodes.iter().filter(|n| pred(&n.outcome)).count()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(
                f,
                "[{}]  {:<24} {}",
                crate::hash::short(&node.hash),
                node.name,
                node.outcome
            )?;
        }
        write!(
            f,
            "{} installed, {} cached, {} failed, {} not attempted",
            self.count(|o| *o == NodeOutcome::Installed),
            self.count(|o| *o == NodeOutcome::CacheHit),
            self.count(|o| matches!(o, NodeOutcome::Failed { .. })),
            self.count(|o| matches!(o, NodeOutcome::NotAttempted { .. })),
        )
    }
}
