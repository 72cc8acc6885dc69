// src/solver/dag.rs

//! Concrete dependency DAG
//!
//! The solver's output: one [`ConcreteNode`] per package name, typed edges,
//! a single root, and virtual bindings. Canonical hashes are computed
//! bottom-up at construction, so a node's hash covers its whole dependency
//! closure.

use crate::error::{Error, Result};
use crate::hash::{FieldHasher, short};
use crate::spec::{ConcreteNode, DepType, DepTypes, NodeLookup};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A concretized dependency DAG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDag")]
pub struct Dag {
    root: String,
    nodes: BTreeMap<String, ConcreteNode>,
    /// Virtual name → provider
    virtuals: BTreeMap<String, String>,
    /// Node name → canonical hash
    hashes: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawDag {
    root: String,
    nodes: BTreeMap<String, ConcreteNode>,
    #[serde(default)]
    virtuals: BTreeMap<String, String>,
}

impl TryFrom<RawDag> for Dag {
    type Error = Error;

    fn try_from(raw: RawDag) -> Result<Self> {
        Dag::new(raw.root, raw.nodes, raw.virtuals)
    }
}

impl Dag {
    /// Build a DAG, checking structure and computing hashes
    ///
    /// Fails if the root is missing, an edge points outside the graph, a
    /// node is unreachable from the root, or the edges contain a cycle.
    pub fn new(
        root: String,
        nodes: BTreeMap<String, ConcreteNode>,
        virtuals: BTreeMap<String, String>,
    ) -> Result<Self> {
        if !nodes.contains_key(&root) {
            return Err(Error::InvalidDag(format!("root {} is not a node", root)));
        }
        for node in nodes.values() {
            for dep in node.dependencies.keys() {
                if !nodes.contains_key(dep) {
                    return Err(Error::InvalidDag(format!(
                        "{} depends on {} which is not a node",
                        node.name, dep
                    )));
                }
            }
        }
        for (virtual_name, provider) in &virtuals {
            if !nodes.contains_key(provider) {
                return Err(Error::InvalidDag(format!(
                    "virtual {} is bound to missing provider {}",
                    virtual_name, provider
                )));
            }
        }

        let mut dag = Self {
            root,
            nodes,
            virtuals,
            hashes: BTreeMap::new(),
        };

        let order = dag.topological_order()?;
        let reachable = dag.closure(&dag.root, |_| true);
        if let Some(orphan) = dag
            .nodes
            .keys()
            .find(|n| **n != dag.root && !reachable.contains(*n))
        {
            return Err(Error::InvalidDag(format!(
                "{} is not reachable from {}",
                orphan, dag.root
            )));
        }

        for name in order {
            let hash = dag.compute_hash(&name);
            dag.hashes.insert(name, hash);
        }
        Ok(dag)
    }

    fn compute_hash(&self, name: &str) -> String {
        let node = &self.nodes[name];
        let mut hasher = FieldHasher::new();
        hasher
            .field("name", &node.name)
            .field("version", node.version.as_str())
            .field("source", &node.source.to_string())
            .field("compiler", &node.compiler.to_string())
            .field("target", &node.target)
            .field("recipe", &node.recipe_hash);
        for (variant, value) in &node.variants {
            hasher.field("variant", &value.render(variant));
        }
        for (dep, types) in &node.dependencies {
            let types: Vec<&str> = types.iter().map(|t| t.as_ref()).collect();
            let dep_hash = self.hashes.get(dep).map(String::as_str).unwrap_or_default();
            hasher.field("dependency", &format!("{} {}", dep_hash, types.join(",")));
        }
        hasher.finish()
    }

    /// Name of the root node
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn root_node(&self) -> &ConcreteNode {
        &self.nodes[&self.root]
    }

    pub fn node(&self, name: &str) -> Option<&ConcreteNode> {
        self.nodes.get(name)
    }

    /// All nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = &ConcreteNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Virtual bindings
    pub fn virtuals(&self) -> &BTreeMap<String, String> {
        &self.virtuals
    }

    /// Canonical hash of a node
    pub fn hash(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    pub fn root_hash(&self) -> &str {
        self.hashes
            .get(&self.root)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = (&String, &DepTypes)> {
        self.nodes
            .get(name)
            .into_iter()
            .flat_map(|n| n.dependencies.iter())
    }

    /// Nodes depending directly on `name`
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| n.dependencies.contains_key(name))
            .map(|n| n.name.clone())
            .collect()
    }

    /// Every node that depends on `name`, directly or transitively
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            for dependent in self.dependents(&current) {
                if found.insert(dependent.clone()) {
                    stack.push(dependent);
                }
            }
        }
        found
    }

    /// Every node `name` depends on, directly or transitively
    pub fn dependency_closure(&self, name: &str) -> BTreeSet<String> {
        self.closure(name, |_| true)
    }

    /// Nodes reachable from `name` over edges accepted by `follow`, excluding `name`
    fn closure(&self, name: &str, follow: impl Fn(&DepTypes) -> bool) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            for (dep, types) in self.dependencies(&current) {
                if follow(types) && found.insert(dep.clone()) {
                    stack.push(dep.clone());
                }
            }
        }
        found
    }

    /// Dependencies of `name` needed at run time, leaves first
    ///
    /// Follows link and run edges transitively; build-only edges are not
    /// part of a package's runtime closure.
    pub fn runtime_closure(&self, name: &str) -> Vec<String> {
        let runtime = |types: &DepTypes| types.contains(&DepType::Link) || types.contains(&DepType::Run);
        let members = self.closure(name, runtime);
        self.topological_order()
            .unwrap_or_default()
            .into_iter()
            .filter(|n| members.contains(n))
            .collect()
    }

    /// Topological order, dependencies before dependents
    ///
    /// Kahn's algorithm over a sorted ready set, so ties break by name and
    /// the order is stable across runs.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .nodes
            .values()
            .map(|n| (n.name.as_str(), n.dependencies.len()))
            .collect();
        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            for dependent in self.nodes.values().filter(|n| n.dependencies.contains_key(name)) {
                if let Some(count) = remaining.get_mut(dependent.name.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent.name.as_str());
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = remaining
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(name, _)| *name)
                .collect();
            return Err(Error::InvalidDag(format!(
                "circular dependency among {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Render the DAG as an indented tree, each node expanded once
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut seen = BTreeSet::new();
        self.render_node(&self.root, 0, &mut seen, &mut out);
        out
    }

    fn render_node(&self, name: &str, depth: usize, seen: &mut BTreeSet<String>, out: &mut String) {
        let Some(node) = self.nodes.get(name) else {
            return;
        };
        let hash = self.hash(name).map(short).unwrap_or_default();
        let marker = if depth == 0 { "" } else { "^" };
        out.push_str(&format!(
            "[{}]  {}{}{}\n",
            hash,
            "    ".repeat(depth),
            marker,
            node.short_spec()
        ));
        if !seen.insert(name.to_string()) {
            return;
        }
        for dep in node.dependencies.keys() {
            if !seen.contains(dep) {
                self.render_node(dep, depth + 1, seen, out);
            }
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, re-validating structure and hashes
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl NodeLookup for Dag {
    fn node(&self, name: &str) -> Option<&ConcreteNode> {
        self.nodes.get(name)
    }

    fn provider_of(&self, virtual_name: &str) -> Option<&str> {
        self.virtuals.get(virtual_name).map(String::as_str)
    }
}
