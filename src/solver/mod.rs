// src/solver/mod.rs

//! Concretization: abstract request → concrete dependency DAG
//!
//! The solver is a depth-first search with chronological backtracking:
//!
//! 1. Names to bind are processed FIFO in discovery order, starting at the
//!    root. Constraints accumulate per name together with their origin.
//! 2. Candidate versions come in the recipe's declared order, filtered by
//!    every accumulated constraint.
//! 3. Each version is tried with variant assignments enumerated
//!    defaults-first (see [`enumerate_assignments`]).
//! 4. Dependency rules whose `when` holds for the tentative node add
//!    constraints and edges. A constraint on an already bound node is
//!    checked immediately; an edge that closes a cycle fails the branch.
//! 5. Virtual dependencies bind one provider, tried in sorted order.
//! 6. Once every name is bound, every conflict rule is evaluated against
//!    the whole graph.
//!
//! A failing branch records its conflict; when the search fails the deepest
//! recorded conflict (most nodes bound) is reported with its chain.

mod conflict;
mod dag;

pub use conflict::{Conflict, Unsatisfiable};
pub use dag::Dag;

use crate::error::{Error, Result};
use crate::recipe::{Recipe, RecipeRepository};
use crate::spec::{
    Compiler, CompilerSpec, ConcreteNode, DepTypes, NodeLookup, Spec, TargetConstraint,
    depends_transitively,
};
use crate::variant::{VariantValue, enumerate_assignments};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Origin recorded for constraints coming from the request itself
const USER_REQUEST: &str = "user request";

/// Solver settings
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Maximum number of candidate bindings tried before giving up
    pub max_attempts: usize,
    /// Maximum number of non-default variant values per package
    pub max_variant_flips: usize,
    /// Compilers available to builds, in preference order
    pub compilers: Vec<Compiler>,
    /// Compiler used when the request does not name one
    pub default_compiler: Option<CompilerSpec>,
    /// Target used when the request does not name one
    pub default_target: String,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_attempts: 100_000,
            max_variant_flips: 2,
            compilers: Vec::new(),
            default_compiler: None,
            default_target: crate::spec::target::host_target(),
        }
    }
}

/// One constraint on a package name and where it came from
#[derive(Debug, Clone)]
struct Constraint {
    spec: Spec,
    origin: String,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.spec.to_string();
        if text.is_empty() {
            write!(f, "{}: any version", self.origin)
        } else {
            write!(f, "{}: {}", self.origin, text)
        }
    }
}

/// Search state; cloned at every choice point
#[derive(Debug, Clone, Default)]
struct State {
    nodes: BTreeMap<String, ConcreteNode>,
    constraints: BTreeMap<String, Vec<Constraint>>,
    queue: VecDeque<String>,
    virtuals: BTreeMap<String, String>,
    /// Compiler and target of the root, inherited by dependencies
    root_compiler: Option<Compiler>,
    root_target: Option<String>,
}

impl NodeLookup for State {
    fn node(&self, name: &str) -> Option<&ConcreteNode> {
        self.nodes.get(name)
    }

    fn provider_of(&self, virtual_name: &str) -> Option<&str> {
        self.virtuals.get(virtual_name).map(String::as_str)
    }
}

impl State {
    /// Concrete name for `name`, following a bound virtual
    fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.virtuals.get(name).map(String::as_str).unwrap_or(name)
    }

    fn add_constraint(&mut self, name: &str, spec: Spec, origin: String) {
        let name = self.resolve_name(name).to_string();
        self.constraints
            .entry(name)
            .or_default()
            .push(Constraint { spec, origin });
    }

    fn constraints_on(&self, name: &str) -> &[Constraint] {
        self.constraints.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn enqueue(&mut self, name: &str) {
        if !self.nodes.contains_key(name) && !self.queue.iter().any(|q| q == name) {
            self.queue.push_back(name.to_string());
        }
    }

    /// Add `from → to`, failing if `to` already reaches `from`
    fn add_edge(&mut self, from: &str, to: &str, types: &DepTypes) -> std::result::Result<(), Conflict> {
        if from == to || depends_transitively(self, to, from) {
            let mut cycle = vec![from.to_string()];
            cycle.extend(path_between(self, to, from));
            return Err(Conflict::CircularDependency { cycle });
        }
        if let Some(node) = self.nodes.get_mut(from) {
            node.dependencies
                .entry(to.to_string())
                .or_default()
                .extend(types.iter().copied());
        }
        Ok(())
    }

    fn chain_for(&self, name: &str) -> Vec<String> {
        self.constraints_on(name).iter().map(ToString::to_string).collect()
    }
}

/// Shortest dependency path `from → ... → to`, inclusive
fn path_between(state: &State, from: &str, to: &str) -> Vec<String> {
    let mut previous: BTreeMap<String, String> = BTreeMap::new();
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(current) = queue.pop_front() {
        if current == to {
            let mut path = vec![to.to_string()];
            let mut step = to.to_string();
            while let Some(prev) = previous.get(&step) {
                path.push(prev.clone());
                step = prev.clone();
            }
            path.reverse();
            return path;
        }
        if let Some(node) = state.nodes.get(&current) {
            for dep in node.dependencies.keys() {
                if dep != from && !previous.contains_key(dep) {
                    previous.insert(dep.clone(), current.clone());
                    queue.push_back(dep.clone());
                }
            }
        }
    }
    vec![from.to_string(), to.to_string()]
}

/// Bookkeeping shared across the whole search
struct SearchContext {
    request: Spec,
    attempts: usize,
    exhausted: bool,
    /// Deepest failure seen: (nodes bound, conflict, chain)
    deepest: Option<(usize, Conflict, Vec<String>)>,
    fingerprints: HashMap<String, String>,
}

impl SearchContext {
    fn fail(&mut self, state: &State, conflict: Conflict, chain: Vec<String>) {
        let depth = state.nodes.len();
        debug!("Backtracking at depth {}: {}", depth, conflict);
        if self.deepest.as_ref().is_none_or(|(d, _, _)| depth > *d) {
            self.deepest = Some((depth, conflict, chain));
        }
    }
}

/// The concretizer
pub struct Solver<'a> {
    repository: &'a dyn RecipeRepository,
    options: SolverOptions,
}

impl<'a> Solver<'a> {
    pub fn new(repository: &'a dyn RecipeRepository, options: SolverOptions) -> Self {
        Self {
            repository,
            options,
        }
    }

    /// Concretize `request` into a DAG
    ///
    /// Never returns a partial DAG: failures are [`Error::Unsatisfiable`]
    /// carrying the deepest conflict, or the repository error that stopped
    /// the search.
    pub fn resolve(&self, request: &Spec) -> Result<Dag> {
        let root = request
            .name
            .clone()
            .ok_or_else(|| Error::invalid_spec(request.to_string(), "the request must name a package"))?;
        if let Err(e) = self.repository.load_recipe(&root) {
            if matches!(e, Error::RecipeNotFound(_)) && !self.repository.providers(&root)?.is_empty() {
                return Err(Error::invalid_spec(
                    request.to_string(),
                    format!("{} is a virtual package; request one of its providers", root),
                ));
            }
            return Err(e);
        }
        if self.options.compilers.is_empty() {
            return Err(Error::Config("no compilers are configured".to_string()));
        }

        info!("Concretizing {}", request);

        let mut state = State::default();
        let mut local = request.clone();
        let dependencies = std::mem::take(&mut local.dependencies);
        state.add_constraint(&root, local, USER_REQUEST.to_string());
        for (name, spec) in dependencies {
            state.add_constraint(&name, spec, format!("{} (^{})", USER_REQUEST, name));
        }
        state.queue.push_back(root.clone());

        let mut ctx = SearchContext {
            request: request.clone(),
            attempts: 0,
            exhausted: false,
            deepest: None,
            fingerprints: HashMap::new(),
        };

        match self.search(state, &mut ctx)? {
            Some(done) => {
                let dag = Dag::new(root, done.nodes, done.virtuals)?;
                info!(
                    "Concretized {} into {} packages after {} attempts",
                    request,
                    dag.len(),
                    ctx.attempts
                );
                Ok(dag)
            }
            None => {
                let (conflict, chain) = match ctx.deepest {
                    Some((_, conflict, chain)) => (conflict, chain),
                    None => (
                        Conflict::NoVersionSatisfies {
                            package: root,
                            constraints: Vec::new(),
                        },
                        Vec::new(),
                    ),
                };
                Err(Unsatisfiable {
                    request: request.to_string(),
                    conflict,
                    chain,
                    attempts: ctx.attempts,
                    exhausted: ctx.exhausted,
                }
                .into())
            }
        }
    }

    /// Bind the next queued name, or finish when nothing is left
    fn search(&self, mut state: State, ctx: &mut SearchContext) -> Result<Option<State>> {
        if ctx.exhausted {
            return Ok(None);
        }
        while let Some(name) = state.queue.pop_front() {
            if state.nodes.contains_key(&name) || state.virtuals.contains_key(&name) {
                continue;
            }
            return match self.repository.load_recipe(&name) {
                Ok(recipe) => self.bind_package(state, recipe, ctx),
                Err(Error::RecipeNotFound(_)) => self.bind_virtual(state, &name, ctx),
                Err(e) => Err(e),
            };
        }
        Ok(self.finish(state, ctx))
    }

    /// Choose a provider for a virtual name
    fn bind_virtual(&self, state: State, name: &str, ctx: &mut SearchContext) -> Result<Option<State>> {
        let providers = self.repository.providers(name)?;
        if providers.is_empty() {
            let required_by = state
                .nodes
                .values()
                .filter(|n| n.dependencies.contains_key(name))
                .map(|n| format!("{}@{}", n.name, n.version))
                .collect();
            ctx.fail(
                &state,
                Conflict::MissingPackage {
                    package: name.to_string(),
                    required_by,
                },
                state.chain_for(name),
            );
            return Ok(None);
        }

        // A provider that is already bound or explicitly requested wins
        let preferred: Vec<String> = providers
            .iter()
            .filter(|p| state.nodes.contains_key(*p) || ctx.request.dependencies.contains_key(*p))
            .cloned()
            .collect();
        let candidates = if preferred.is_empty() { providers } else { preferred };

        for provider in candidates {
            if ctx.exhausted {
                return Ok(None);
            }
            debug!("Trying {} as provider of {}", provider, name);
            let mut next = state.clone();
            next.virtuals.insert(name.to_string(), provider.clone());

            let moved = next.constraints.remove(name).unwrap_or_default();
            next.constraints
                .entry(provider.clone())
                .or_default()
                .extend(moved);

            if let Err(conflict) = redirect_edges(&mut next, name, &provider) {
                ctx.fail(&next, conflict, next.chain_for(&provider));
                continue;
            }

            if let Some(bound) = next.nodes.get(&provider) {
                if let Some(conflict) = violated_constraint(&next, bound) {
                    ctx.fail(&next, conflict, next.chain_for(&provider));
                    continue;
                }
            } else {
                next.queue.push_front(provider.clone());
            }

            if let Some(done) = self.search(next, ctx)? {
                return Ok(Some(done));
            }
        }
        Ok(None)
    }

    /// Try every version and variant assignment of one package
    fn bind_package(
        &self,
        state: State,
        recipe: Arc<Recipe>,
        ctx: &mut SearchContext,
    ) -> Result<Option<State>> {
        let name = recipe.name().to_string();
        let constraints = state.constraints_on(&name).to_vec();

        let pinned = match pinned_variants(&recipe, &constraints) {
            Ok(pinned) => pinned,
            Err(conflict) => {
                ctx.fail(&state, conflict, state.chain_for(&name));
                return Ok(None);
            }
        };

        let versions: Vec<_> = recipe
            .versions
            .iter()
            .filter(|entry| constraints.iter().all(|c| c.spec.versions.satisfies(&entry.version)))
            .collect();
        if versions.is_empty() {
            let conflict = Conflict::NoVersionSatisfies {
                package: name.clone(),
                constraints: constraints
                    .iter()
                    .map(|c| (c.origin.clone(), c.spec.versions.to_string()))
                    .collect(),
            };
            ctx.fail(&state, conflict, state.chain_for(&name));
            return Ok(None);
        }

        let compilers = match self.compiler_candidates(&state, &name, &constraints) {
            Ok(compilers) => compilers,
            Err(conflict) => {
                ctx.fail(&state, conflict, state.chain_for(&name));
                return Ok(None);
            }
        };
        let target = match self.target_for(&state, &name, &constraints) {
            Ok(target) => target,
            Err(conflict) => {
                ctx.fail(&state, conflict, state.chain_for(&name));
                return Ok(None);
            }
        };

        let recipe_hash = ctx
            .fingerprints
            .entry(name.clone())
            .or_insert_with(|| recipe.fingerprint())
            .clone();
        let assignments =
            enumerate_assignments(&recipe.variants, &pinned, self.options.max_variant_flips);

        for entry in versions {
            for compiler in &compilers {
                for variants in &assignments {
                    ctx.attempts += 1;
                    if ctx.attempts > self.options.max_attempts {
                        ctx.exhausted = true;
                        return Ok(None);
                    }

                    let node = ConcreteNode {
                        name: name.clone(),
                        version: entry.version.clone(),
                        source: entry.source(),
                        variants: variants.clone(),
                        compiler: compiler.clone(),
                        target: target.clone(),
                        dependencies: BTreeMap::new(),
                        recipe_hash: recipe_hash.clone(),
                    };
                    debug!("Trying {}", node.short_spec());

                    let next = match self.bind_node(&state, &recipe, node, ctx) {
                        Some(next) => next,
                        None => continue,
                    };
                    if let Some(done) = self.search(next, ctx)? {
                        return Ok(Some(done));
                    }
                    if ctx.exhausted {
                        return Ok(None);
                    }
                }
            }
        }
        Ok(None)
    }

    /// Add one tentative node and activate its dependency rules
    fn bind_node(
        &self,
        state: &State,
        recipe: &Recipe,
        node: ConcreteNode,
        ctx: &mut SearchContext,
    ) -> Option<State> {
        let name = node.name.clone();
        let label = format!("{}@{}", node.name, node.version);
        let mut next = state.clone();
        if next.root_compiler.is_none() {
            next.root_compiler = Some(node.compiler.clone());
            next.root_target = Some(node.target.clone());
        }
        next.nodes.insert(name.clone(), node);

        // Conflicts that only look at this node can be checked right away
        for rule in &recipe.conflicts {
            let local = !rule.spec.has_dependency_constraints()
                && rule.when.as_ref().is_none_or(|w| !w.has_dependency_constraints());
            if local && let Some(conflict) = conflict_holds(&next, &name, rule) {
                ctx.fail(&next, conflict, next.chain_for(&name));
                return None;
            }
        }

        for rule in &recipe.depends {
            let active = match &rule.when {
                Some(when) => when.satisfied_by(&next.nodes[&name], &next),
                None => true,
            };
            if !active {
                continue;
            }

            let dep = rule.dependency_name().to_string();
            let origin = format!("{} depends on {}", label, rule.spec);
            let mut local = rule.spec.clone();
            for (nested, spec) in std::mem::take(&mut local.dependencies) {
                next.add_constraint(&nested, spec.clone(), origin.clone());
                let concrete = next.resolve_name(&nested).to_string();
                if let Some(bound) = next.nodes.get(&concrete)
                    && !spec.admits_local(bound)
                {
                    let conflict = Conflict::UnsatisfiableConstraint {
                        package: concrete.clone(),
                        bound: bound.short_spec(),
                        required_constraint: spec.to_string(),
                        required_by: label.clone(),
                    };
                    ctx.fail(&next, conflict, next.chain_for(&concrete));
                    return None;
                }
            }
            next.add_constraint(&dep, local.clone(), origin.clone());

            let target = next.resolve_name(&dep).to_string();
            if let Some(bound) = next.nodes.get(&target)
                && !local.admits_local(bound)
            {
                let conflict = Conflict::UnsatisfiableConstraint {
                    package: target.clone(),
                    bound: bound.short_spec(),
                    required_constraint: local.to_string(),
                    required_by: label.clone(),
                };
                ctx.fail(&next, conflict, next.chain_for(&target));
                return None;
            }
            if let Err(conflict) = next.add_edge(&name, &target, &rule.types) {
                ctx.fail(&next, conflict, vec![origin]);
                return None;
            }
            next.enqueue(&target);
        }

        Some(next)
    }

    /// Final checks once every name is bound
    fn finish(&self, state: State, ctx: &mut SearchContext) -> Option<State> {
        for node in state.nodes.values() {
            let recipe = match self.repository.load_recipe(&node.name) {
                Ok(recipe) => recipe,
                Err(_) => continue,
            };
            for rule in &recipe.conflicts {
                if let Some(conflict) = conflict_holds(&state, &node.name, rule) {
                    ctx.fail(&state, conflict, state.chain_for(&node.name));
                    return None;
                }
            }
        }

        // Every accumulated constraint, including `^` clauses from recipes,
        // must name a node of the graph and hold for it
        for name in state.constraints.keys() {
            let concrete = state.resolve_name(name);
            let Some(node) = state.nodes.get(concrete) else {
                let conflict = Conflict::UnusedConstraint {
                    package: name.clone(),
                };
                ctx.fail(&state, conflict, state.chain_for(name));
                return None;
            };
            if let Some(conflict) = violated_constraint(&state, node) {
                ctx.fail(&state, conflict, state.chain_for(concrete));
                return None;
            }
        }

        Some(state)
    }

    /// Configured compilers acceptable for a package, inherited one first
    fn compiler_candidates(
        &self,
        state: &State,
        name: &str,
        constraints: &[Constraint],
    ) -> std::result::Result<Vec<Compiler>, Conflict> {
        let required: Vec<&CompilerSpec> =
            constraints.iter().filter_map(|c| c.spec.compiler.as_ref()).collect();
        let acceptable = |c: &Compiler| required.iter().all(|r| r.matches(c));

        let preferred = match &state.root_compiler {
            Some(inherited) => Some(inherited.clone()),
            None => self.default_compiler(),
        };

        let mut candidates = Vec::new();
        if let Some(preferred) = preferred.filter(|c| acceptable(c)) {
            candidates.push(preferred);
        }
        for compiler in &self.options.compilers {
            if acceptable(compiler) && !candidates.contains(compiler) {
                candidates.push(compiler.clone());
            }
        }
        // Dependencies stay on the root's compiler unless something demands otherwise
        if state.root_compiler.is_some() && required.is_empty() {
            candidates.truncate(1);
        }

        if candidates.is_empty() {
            return Err(Conflict::NoCompiler {
                package: name.to_string(),
                constraints: required.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(candidates)
    }

    fn default_compiler(&self) -> Option<Compiler> {
        match &self.options.default_compiler {
            Some(spec) => self.options.compilers.iter().find(|c| spec.matches(c)).cloned(),
            None => self.options.compilers.first().cloned(),
        }
    }

    /// Target for a package: the inherited one unless a constraint rules it out
    fn target_for(
        &self,
        state: &State,
        name: &str,
        constraints: &[Constraint],
    ) -> std::result::Result<String, Conflict> {
        let required: Vec<&TargetConstraint> =
            constraints.iter().filter_map(|c| c.spec.target.as_ref()).collect();
        let inherited = state
            .root_target
            .clone()
            .unwrap_or_else(|| self.options.default_target.clone());

        std::iter::once(inherited)
            .chain(required.iter().map(|t| t.name.clone()))
            .find(|candidate| required.iter().all(|t| t.matches(candidate)))
            .ok_or_else(|| Conflict::TargetMismatch {
                package: name.to_string(),
                constraints: required.iter().map(|t| format!("target={}", t)).collect(),
            })
    }
}

/// Merge variant pins from every constraint, checking them against the recipe
fn pinned_variants(
    recipe: &Recipe,
    constraints: &[Constraint],
) -> std::result::Result<BTreeMap<String, VariantValue>, Conflict> {
    let mut pinned: BTreeMap<String, (VariantValue, &str)> = BTreeMap::new();
    for constraint in constraints {
        for (variant, value) in &constraint.spec.variants {
            let legal = recipe.variant(variant).is_some_and(|decl| decl.accepts(value));
            if !legal {
                return Err(Conflict::InvalidVariant {
                    package: recipe.name().to_string(),
                    variant: variant.clone(),
                    value: value.to_string(),
                    origin: constraint.origin.clone(),
                });
            }
            match pinned.get(variant) {
                Some((existing, origin)) if existing != value => {
                    return Err(Conflict::ConflictingVariant {
                        package: recipe.name().to_string(),
                        variant: variant.clone(),
                        values: vec![
                            (origin.to_string(), existing.render(variant)),
                            (constraint.origin.clone(), value.render(variant)),
                        ],
                    });
                }
                Some(_) => {}
                None => {
                    pinned.insert(variant.clone(), (value.clone(), constraint.origin.as_str()));
                }
            }
        }
    }
    Ok(pinned.into_iter().map(|(k, (v, _))| (k, v)).collect())
}

/// First constraint a bound node violates, if any
fn violated_constraint(state: &State, node: &ConcreteNode) -> Option<Conflict> {
    state
        .constraints_on(&node.name)
        .iter()
        .find(|c| !c.spec.admits_local(node))
        .map(|c| Conflict::UnsatisfiableConstraint {
            package: node.name.clone(),
            bound: node.short_spec(),
            required_constraint: c.spec.to_string(),
            required_by: c.origin.clone(),
        })
}

/// Evaluate one conflict rule of `name`'s recipe
fn conflict_holds(
    state: &State,
    name: &str,
    rule: &crate::recipe::ConflictRule,
) -> Option<Conflict> {
    let node = state.nodes.get(name)?;
    let holds = rule.spec.satisfied_by(node, state)
        && rule.when.as_ref().is_none_or(|w| w.satisfied_by(node, state));
    holds.then(|| Conflict::ConflictRule {
        package: name.to_string(),
        rule: match &rule.when {
            Some(when) => format!("{} when {}", rule.spec, when),
            None => rule.spec.to_string(),
        },
        message: rule.msg.clone(),
    })
}

/// Point edges aimed at a virtual name to its provider
fn redirect_edges(
    state: &mut State,
    virtual_name: &str,
    provider: &str,
) -> std::result::Result<(), Conflict> {
    let sources: Vec<(String, DepTypes)> = state
        .nodes
        .values_mut()
        .filter_map(|n| {
            n.dependencies
                .remove(virtual_name)
                .map(|types| (n.name.clone(), types))
        })
        .collect();
    for (from, types) in sources {
        state.add_edge(&from, provider, &types)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::MemoryRepository;
    use crate::version::Version;

    fn options() -> SolverOptions {
        SolverOptions {
            compilers: vec![
                Compiler {
                    name: "gcc".to_string(),
                    version: Version::parse("9.3.0").unwrap(),
                },
                Compiler {
                    name: "gcc".to_string(),
                    version: Version::parse("4.8.5").unwrap(),
                },
            ],
            default_target: "x86_64".to_string(),
            ..Default::default()
        }
    }

    fn resolve(repo: &MemoryRepository, request: &str) -> Result<Dag> {
        Solver::new(repo, options()).resolve(&Spec::parse(request).unwrap())
    }

    fn unsatisfiable(result: Result<Dag>) -> Unsatisfiable {
        match result {
            Err(Error::Unsatisfiable(u)) => *u,
            other => panic!("expected unsatisfiable, got {:?}", other.map(|d| d.render_tree())),
        }
    }

    const FEATURE_A: &str = r#"
[package]
name = "a"

[[versions]]
version = "1.0"

[[variants]]
name = "feature"
default = false

[[depends]]
spec = "b@2.0:"
when = "+feature"
"#;

    const B: &str = r#"
[package]
name = "b"

[[versions]]
version = "2.1"

[[versions]]
version = "2.0"

[[versions]]
version = "1.5"
"#;

    #[test]
    fn test_conditional_dependency() {
        let repo = MemoryRepository::from_toml([FEATURE_A, B]).unwrap();

        let with = resolve(&repo, "a +feature").unwrap();
        let b = with.node("b").unwrap();
        assert!(b.version >= Version::parse("2.0").unwrap());
        assert_eq!(b.version.as_str(), "2.1");

        let without = resolve(&repo, "a").unwrap();
        assert!(!without.contains("b"));
        assert_eq!(without.len(), 1);
    }

    #[test]
    fn test_request_constrains_dependency() {
        let repo = MemoryRepository::from_toml([FEATURE_A, B]).unwrap();
        let dag = resolve(&repo, "a +feature ^b@2.0").unwrap();
        assert_eq!(dag.node("b").unwrap().version.as_str(), "2.0");

        let err = unsatisfiable(resolve(&repo, "a +feature ^b@:1.9"));
        assert!(matches!(err.conflict, Conflict::NoVersionSatisfies { .. }));
        assert!(err.chain.iter().any(|l| l.contains("user request")));
    }

    #[test]
    fn test_unused_request_constraint() {
        let repo = MemoryRepository::from_toml([FEATURE_A, B]).unwrap();
        // Without +feature nothing pulls b in, so the variant flips on
        let dag = resolve(&repo, "a ^b").unwrap();
        assert!(dag.root_node().variant_enabled("feature"));

        let err = unsatisfiable(resolve(&repo, "a ~feature ^b"));
        assert!(matches!(err.conflict, Conflict::UnusedConstraint { .. }));
    }

    #[test]
    fn test_unknown_root() {
        let repo = MemoryRepository::from_toml([B]).unwrap();
        assert!(matches!(
            resolve(&repo, "nothing"),
            Err(Error::RecipeNotFound(_))
        ));
    }

    #[test]
    fn test_undeclared_variant_in_request() {
        let repo = MemoryRepository::from_toml([B]).unwrap();
        let err = unsatisfiable(resolve(&repo, "b +shared"));
        assert!(matches!(err.conflict, Conflict::InvalidVariant { .. }));
    }

    #[test]
    fn test_compiler_selection() {
        let repo = MemoryRepository::from_toml([B]).unwrap();
        let dag = resolve(&repo, "b").unwrap();
        assert_eq!(dag.root_node().compiler.version.as_str(), "9.3.0");

        let dag = resolve(&repo, "b %gcc@:5").unwrap();
        assert_eq!(dag.root_node().compiler.version.as_str(), "4.8.5");

        let err = unsatisfiable(resolve(&repo, "b %clang"));
        assert!(matches!(err.conflict, Conflict::NoCompiler { .. }));
    }

    #[test]
    fn test_target_selection() {
        let repo = MemoryRepository::from_toml([B]).unwrap();
        let dag = resolve(&repo, "b target=haswell").unwrap();
        assert_eq!(dag.root_node().target, "haswell");

        let dag = resolve(&repo, "b target=x86_64:").unwrap();
        assert_eq!(dag.root_node().target, "x86_64");
    }

    #[test]
    fn test_budget_exhaustion() {
        let repo = MemoryRepository::from_toml([FEATURE_A, B]).unwrap();
        let mut opts = options();
        opts.max_attempts = 1;
        let result = Solver::new(&repo, opts).resolve(&Spec::parse("a +feature").unwrap());
        let err = unsatisfiable(result);
        assert!(err.exhausted);
    }
}
