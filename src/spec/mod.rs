// src/spec/mod.rs

//! Spec model: abstract package requests and concrete nodes
//!
//! An abstract [`Spec`] carries partial constraints (any subset of version,
//! variants, compiler, target and `^dependency` constraints). It is what the
//! user asks for and what recipes use for dependency constraints and `when`
//! predicates. A [`ConcreteNode`] is one fully resolved package inside a
//! dependency DAG.
//!
//! Predicates are evaluated through [`NodeLookup`] so the same code works
//! against the solver's partial state and against a finished DAG.

mod parser;
pub mod target;

pub use parser::is_valid_package_name;
pub use target::TargetConstraint;

use crate::error::Result;
use crate::variant::VariantValue;
use crate::version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

/// Compiler requirement, e.g. `%gcc@9:`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilerSpec {
    pub name: String,
    pub versions: VersionConstraint,
}

impl CompilerSpec {
    /// Parse a compiler requirement, with or without the leading `%`
    pub fn parse(input: &str) -> Result<Self> {
        parser::parse_compiler(input)
    }

    /// Whether a concrete compiler satisfies this requirement
    pub fn matches(&self, compiler: &Compiler) -> bool {
        self.name == compiler.name && self.versions.satisfies(&compiler.version)
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        Ok(())
    }
}

/// A concrete compiler: name and exact version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Compiler {
    pub name: String,
    pub version: Version,
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// How a dependency is used
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    /// Needed only while building the dependent
    Build,
    /// Linked into the dependent
    Link,
    /// Needed when the dependent runs
    Run,
}

/// Set of dependency types carried by one edge
pub type DepTypes = BTreeSet<DepType>;

/// The default edge type when a recipe does not name one
pub fn default_dep_types() -> DepTypes {
    [DepType::Build, DepType::Link].into_iter().collect()
}

/// Parse a comma separated list such as `build,link`
pub fn parse_dep_types(s: &str) -> Result<DepTypes> {
    let mut types = DepTypes::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let dep_type = DepType::from_str(part).map_err(|_| {
            crate::error::Error::invalid_spec(s, format!("unknown dependency type '{}'", part))
        })?;
        types.insert(dep_type);
    }
    if types.is_empty() {
        return Ok(default_dep_types());
    }
    Ok(types)
}

/// An abstract spec: a partial description of a package build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spec {
    /// Package name; `None` for anonymous predicates such as `+cuda`
    pub name: Option<String>,
    pub versions: VersionConstraint,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: Option<CompilerSpec>,
    pub target: Option<TargetConstraint>,
    /// `^name...` constraints on packages anywhere below this one
    pub dependencies: BTreeMap<String, Spec>,
}

impl Spec {
    /// Parse a spec string
    pub fn parse(input: &str) -> Result<Self> {
        parser::parse(input)
    }

    /// A spec constraining only the name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Whether any `^dependency` constraint appears
    pub fn has_dependency_constraints(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Evaluate this spec as a predicate on `node`
    ///
    /// `^dep` constraints look for `dep` among the node's transitive
    /// dependencies; virtual names resolve through the lookup.
    pub fn satisfied_by(&self, node: &ConcreteNode, lookup: &dyn NodeLookup) -> bool {
        if let Some(name) = &self.name
            && name != &node.name
            && lookup.provider_of(name) != Some(node.name.as_str())
        {
            return false;
        }
        if !self.versions.satisfies(&node.version) {
            return false;
        }
        for (variant, wanted) in &self.variants {
            if node.variants.get(variant) != Some(wanted) {
                return false;
            }
        }
        if let Some(compiler) = &self.compiler
            && !compiler.matches(&node.compiler)
        {
            return false;
        }
        if let Some(target) = &self.target
            && !target.matches(&node.target)
        {
            return false;
        }
        for (dep_name, dep_spec) in &self.dependencies {
            let concrete = lookup.provider_of(dep_name).unwrap_or(dep_name);
            if !depends_transitively(lookup, &node.name, concrete) {
                return false;
            }
            match lookup.node(concrete) {
                Some(dep) if dep_spec.satisfied_by(dep, lookup) => {}
                _ => return false,
            }
        }
        true
    }

    /// Check that an explicit constraint admits a node, ignoring `^` clauses
    ///
    /// Used when a dependency rule or a request constrains a bound node.
    pub fn admits_local(&self, node: &ConcreteNode) -> bool {
        self.versions.satisfies(&node.version)
            && self
                .variants
                .iter()
                .all(|(k, v)| node.variants.get(k) == Some(v))
            && self.compiler.as_ref().is_none_or(|c| c.matches(&node.compiler))
            && self.target.as_ref().is_none_or(|t| t.matches(&node.target))
    }

    /// Render the spec without its `^` clauses
    fn local_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match (&self.name, self.versions.is_any()) {
            (Some(name), true) => parts.push(name.clone()),
            (Some(name), false) => parts.push(format!("{}@{}", name, self.versions)),
            (None, false) => parts.push(format!("@{}", self.versions)),
            (None, true) => {}
        }
        for (name, value) in &self.variants {
            parts.push(value.render(name));
        }
        if let Some(compiler) = &self.compiler {
            parts.push(compiler.to_string());
        }
        if let Some(target) = &self.target {
            parts.push(format!("target={}", target));
        }
        parts.join(" ")
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![self.local_string()];
        parts.extend(self.dependencies.values().map(|d| format!("^{}", d.local_string())));
        parts.retain(|p| !p.is_empty());
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Spec {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Spec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Spec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Where a concrete version comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    Commit(String),
    Branch(String),
    Tag(String),
    Url(String),
    #[default]
    None,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit(c) => write!(f, "commit={}", c),
            Self::Branch(b) => write!(f, "branch={}", b),
            Self::Tag(t) => write!(f, "tag={}", t),
            Self::Url(u) => write!(f, "url={}", u),
            Self::None => write!(f, "-"),
        }
    }
}

/// One fully resolved package
///
/// The variant map is total: every variant the recipe declares has a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteNode {
    pub name: String,
    pub version: Version,
    pub source: VersionSource,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: Compiler,
    pub target: String,
    /// Direct dependencies by concrete name
    pub dependencies: BTreeMap<String, DepTypes>,
    /// Fingerprint of the recipe that produced this node
    pub recipe_hash: String,
}

impl ConcreteNode {
    /// Short human form: `name@version +a ~b %gcc@9.3.0 target=x86_64`
    pub fn short_spec(&self) -> String {
        let mut parts = vec![format!("{}@{}", self.name, self.version)];
        for (name, value) in &self.variants {
            parts.push(value.render(name));
        }
        parts.push(format!("%{}", self.compiler));
        parts.push(format!("target={}", self.target));
        parts.join(" ")
    }

    /// Value of a boolean variant, false when absent
    pub fn variant_enabled(&self, name: &str) -> bool {
        self.variants.get(name) == Some(&VariantValue::Bool(true))
    }
}

impl fmt::Display for ConcreteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_spec())
    }
}

/// Read access to a set of concrete nodes
pub trait NodeLookup {
    /// Node by concrete name
    fn node(&self, name: &str) -> Option<&ConcreteNode>;

    /// Concrete provider bound to a virtual name, if any
    fn provider_of(&self, virtual_name: &str) -> Option<&str>;
}

/// Whether `from` reaches `to` through dependency edges
pub fn depends_transitively(lookup: &dyn NodeLookup, from: &str, to: &str) -> bool {
    let mut stack = vec![from.to_string()];
    let mut seen = BTreeSet::new();
    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let Some(node) = lookup.node(&current) else {
            continue;
        };
        for dep in node.dependencies.keys() {
            if dep == to {
                return true;
            }
            stack.push(dep.clone());
        }
    }
    false
}
