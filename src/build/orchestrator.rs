// src/build/orchestrator.rs

//! DAG build orchestration
//!
//! The calling thread acts as coordinator. It keeps an in-degree count per
//! node, dispatches every node whose dependencies have settled to a bounded
//! rayon pool, and receives completions over a channel. A node settles as a
//! cache hit, an install, a failure, or as not attempted because something
//! below it failed; only the first two unblock its dependents.

use crate::build::flags::{render_arguments, template_vars};
use crate::build::phases::{ARCHIVE_NAME, BUILD_DIR, PlanInput, SOURCE_DIR, build_phases, fetch_phases};
use crate::build::report::{BuildReport, NodeOutcome, NodeReport};
use crate::build::tool::{BuildTool, Invocation};
use crate::db::{BuildRecord, BuildStatus, BuildStore, DependencyLink, StoreLayout, paths};
use crate::environment::{self, EnvironmentComposer};
use crate::error::{Error, Result};
use crate::hash;
use crate::recipe::RecipeRepository;
use crate::solver::Dag;
use crate::spec::{Compiler, ConcreteNode, VersionSource};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Output kept in a failure's error text
const OUTPUT_TAIL_LINES: usize = 20;

/// A configured compiler and the executables that implement it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub compiler: Compiler,
    pub cc: Option<PathBuf>,
    pub cxx: Option<PathBuf>,
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Concurrent node builds
    pub jobs: usize,
    /// Parallelism passed to each build system
    pub make_jobs: usize,
    /// Limit on any single phase
    pub timeout: Option<Duration>,
    /// Rebuild installed records whose prefix has gone missing
    pub force: bool,
    /// Keep stage directories of successful builds
    pub keep_stage: bool,
    pub toolchains: Vec<Toolchain>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            make_jobs: 1,
            timeout: None,
            force: false,
            keep_stage: false,
            toolchains: Vec::new(),
        }
    }
}

/// Builds concretized DAGs into a store
pub struct Orchestrator<'a> {
    repository: &'a dyn RecipeRepository,
    store: &'a BuildStore,
    tool: &'a dyn BuildTool,
    layout: StoreLayout,
    options: BuildOptions,
}

/// Coordinator bookkeeping
struct Schedule<'d> {
    dag: &'d Dag,
    pending_deps: BTreeMap<String, usize>,
    outcomes: BTreeMap<String, NodeOutcome>,
    ready: VecDeque<String>,
}

impl<'d> Schedule<'d> {
    fn new(dag: &'d Dag, order: &[String]) -> Self {
        let pending_deps: BTreeMap<String, usize> = order
            .iter()
            .map(|name| (name.clone(), dag.dependencies(name).count()))
            .collect();
        let ready = order
            .iter()
            .filter(|name| pending_deps[*name] == 0)
            .cloned()
            .collect();
        Self {
            dag,
            pending_deps,
            outcomes: BTreeMap::new(),
            ready,
        }
    }

    /// The failed node that blocks `name`, if any dependency did not succeed
    fn blocked_by(&self, name: &str) -> Option<String> {
        self.dag.dependencies(name).find_map(|(dep, _)| match self.outcomes.get(dep) {
            Some(NodeOutcome::Failed { .. }) => Some(dep.clone()),
            Some(NodeOutcome::NotAttempted { blocked_by }) => Some(blocked_by.clone()),
            _ => None,
        })
    }

    /// Record an outcome and release dependents whose inputs have all settled
    fn settle(&mut self, name: &str, outcome: NodeOutcome) {
        self.outcomes.insert(name.to_string(), outcome);
        for dependent in self.dag.dependents(name) {
            if let Some(count) = self.pending_deps.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    self.ready.push_back(dependent);
                }
            }
        }
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        repository: &'a dyn RecipeRepository,
        store: &'a BuildStore,
        tool: &'a dyn BuildTool,
        layout: StoreLayout,
        options: BuildOptions,
    ) -> Self {
        Self {
            repository,
            store,
            tool,
            layout,
            options,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Install prefix of a DAG node
    pub fn prefix_of(&self, dag: &Dag, name: &str) -> Option<PathBuf> {
        let node = dag.node(name)?;
        let hash = dag.hash(name)?;
        Some(self.layout.prefix_for(node, hash))
    }

    /// Build every node of `dag` that is not already installed
    ///
    /// Per-node failures are reported in the [`BuildReport`]; `Err` means
    /// the run could not start (store or filesystem trouble).
    pub fn build(&self, dag: &Dag) -> Result<BuildReport> {
        let order = dag.topological_order()?;
        fs::create_dir_all(self.layout.opt_dir())?;
        fs::create_dir_all(self.layout.stage_dir())?;

        for name in &order {
            self.register(dag, name)?;
        }

        info!(
            "Building {} ({} packages, {} concurrent)",
            dag.root(),
            order.len(),
            self.options.jobs
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs.max(1))
            .thread_name(|i| format!("brigade-build-{}", i))
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let mut schedule = Schedule::new(dag, &order);
        let (tx, rx) = mpsc::channel::<(String, NodeOutcome)>();

        pool.in_place_scope(|scope| {
            let mut running = 0usize;
            loop {
                while let Some(name) = schedule.ready.pop_front() {
                    if let Some(blocker) = schedule.blocked_by(&name) {
                        info!("Skipping {}: {} failed", name, blocker);
                        schedule.settle(&name, NodeOutcome::NotAttempted { blocked_by: blocker });
                        continue;
                    }
                    if let Some(outcome) = self.check_cache(dag, &name) {
                        schedule.settle(&name, outcome);
                        continue;
                    }
                    running += 1;
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        // Every dispatched node must report back, even one whose build panicked
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.build_node(dag, &name)))
                            .unwrap_or_else(|payload| self.panicked(dag, &name, payload.as_ref()));
                        let _ = tx.send((name, outcome));
                    });
                }

                if running == 0 {
                    break;
                }
                let Ok((name, outcome)) = rx.recv() else {
                    break;
                };
                running -= 1;
                schedule.settle(&name, outcome);
            }
        });

        let nodes = order
            .iter()
            .map(|name| NodeReport {
                name: name.clone(),
                hash: dag.hash(name).unwrap_or_default().to_string(),
                prefix: self.prefix_of(dag, name).unwrap_or_default(),
                outcome: schedule.outcomes.remove(name).unwrap_or(NodeOutcome::NotAttempted {
                    blocked_by: dag.root().to_string(),
                }),
            })
            .collect();
        let report = BuildReport {
            root: dag.root().to_string(),
            nodes,
        };

        if report.success() {
            info!("Build of {} complete", dag.root());
        } else {
            warn!("Build of {} finished with failures", dag.root());
        }
        Ok(report)
    }

    /// Write a pending record for a node the store does not know yet
    fn register(&self, dag: &Dag, name: &str) -> Result<()> {
        let (node, hash) = node_and_hash(dag, name)?;
        let dependencies = dag
            .dependencies(name)
            .map(|(dep, types)| DependencyLink {
                hash: dag.hash(dep).unwrap_or_default().to_string(),
                name: dep.clone(),
                types: types.clone(),
            })
            .collect();
        let record = BuildRecord::new(
            hash.to_string(),
            node.clone(),
            self.layout.prefix_for(node, hash),
            dependencies,
        );
        self.store.insert_if_absent(record)?;
        Ok(())
    }

    /// Settle a node from its record without building, if possible
    fn check_cache(&self, dag: &Dag, name: &str) -> Option<NodeOutcome> {
        let hash = dag.hash(name)?;
        let record = match self.store.get(hash) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => return Some(NodeOutcome::Failed { error: e.to_string() }),
        };
        if record.status != BuildStatus::Installed {
            return None;
        }
        if record.prefix.is_dir() {
            debug!("{} is installed at {}", name, record.prefix.display());
            return Some(NodeOutcome::CacheHit);
        }
        if self.options.force {
            warn!(
                "Prefix of {} is missing; rebuilding {}",
                name,
                record.prefix.display()
            );
            return None;
        }
        let error = Error::CacheCorruption {
            hash: hash.to_string(),
            reason: format!(
                "{} is recorded as installed but {} does not exist",
                name,
                record.prefix.display()
            ),
        };
        Some(NodeOutcome::Failed {
            error: error.to_string(),
        })
    }

    /// Build one node on a worker thread
    fn build_node(&self, dag: &Dag, name: &str) -> NodeOutcome {
        let mut log = String::new();
        match self.try_build(dag, name, &mut log) {
            Ok(()) => NodeOutcome::Installed,
            Err(e) => {
                warn!("Build of {} failed: {}", name, e);
                let error = match &e {
                    Error::BuildFailed { output, .. } if !output.is_empty() => {
                        format!("{}\n{}", e, output)
                    }
                    _ => e.to_string(),
                };
                if let Ok((node, hash)) = node_and_hash(dag, name) {
                    let stage = self.layout.stage_for(node, hash);
                    let log_path = write_log(&stage, &log);
                    if let Err(store_err) = self.store.mark_failed(hash, &error, log_path) {
                        warn!("Could not record failure of {}: {}", name, store_err);
                    }
                    let prefix = self.layout.prefix_for(node, hash);
                    if prefix.exists() {
                        let _ = fs::remove_dir_all(&prefix);
                    }
                }
                NodeOutcome::Failed { error }
            }
        }
    }

    /// Outcome of a node whose build panicked
    fn panicked(&self, dag: &Dag, name: &str, payload: &(dyn Any + Send)) -> NodeOutcome {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let error = format!("Build of {} panicked: {}", name, detail);
        warn!("{}", error);
        if let Some(hash) = dag.hash(name)
            && let Err(e) = self.store.mark_failed(hash, &error, None)
        {
            warn!("Could not record failure of {}: {}", name, e);
        }
        NodeOutcome::Failed { error }
    }

    fn try_build(&self, dag: &Dag, name: &str, log: &mut String) -> Result<()> {
        let (node, hash) = node_and_hash(dag, name)?;
        let recipe = self.repository.load_recipe(name)?;
        let prefix = self.layout.prefix_for(node, hash);
        let stage = self.layout.stage_for(node, hash);

        self.store.mark_building(hash)?;
        info!("Building {} [{}]", node.short_spec(), hash::short(hash));

        reset_dir(&stage)?;
        fs::create_dir_all(stage.join(SOURCE_DIR))?;
        fs::create_dir_all(stage.join(BUILD_DIR))?;
        reset_dir(&prefix)?;

        let vars = template_vars(
            dag,
            name,
            self.repository,
            |n| self.prefix_of(dag, n),
            self.options.make_jobs,
        )?;
        let args = render_arguments(&recipe, node, dag, &vars)?;
        let env = self.build_environment(dag, node)?;

        let input = PlanInput {
            build_system: recipe.package.build_system,
            source: &node.source,
            git: recipe.package.git.as_deref(),
            stage: &stage,
            prefix: &prefix,
            args: &args,
            make_jobs: self.options.make_jobs,
        };
        let phases = fetch_phases(&input).into_iter().chain(build_phases(&input));

        for phase in phases {
            let invocation = Invocation {
                argv: phase.argv,
                workdir: phase.workdir,
                env: env.clone(),
                timeout: self.options.timeout,
            };
            let _ = writeln!(log, "==> {}: {}", phase.name, invocation.command_line());
            let output = self.tool.invoke(&invocation)?;
            log.push_str(&output.output);

            if !output.success() {
                let reason = if output.timed_out {
                    format!(
                        "{} phase timed out after {} seconds",
                        phase.name,
                        self.options.timeout.map(|t| t.as_secs()).unwrap_or_default()
                    )
                } else {
                    match output.exit_code {
                        Some(code) => format!("{} phase exited with status {}", phase.name, code),
                        None => format!("{} phase was killed by a signal", phase.name),
                    }
                };
                return Err(Error::BuildFailed {
                    spec: node.short_spec(),
                    reason,
                    output: tail(&output.output, OUTPUT_TAIL_LINES),
                });
            }

            if phase.name == "fetch"
                && let VersionSource::Url(_) = node.source
            {
                verify_checksum(&recipe, node, &stage.join(ARCHIVE_NAME))?;
            }
        }

        let captured = environment::capture(&recipe, node, dag, &prefix, &vars)?;
        let metadata = paths::metadata_dir(&prefix);
        fs::create_dir_all(&metadata)?;
        fs::write(metadata.join("spec.json"), serde_json::to_string_pretty(node)?)?;
        let log_path = metadata.join("build.log");
        fs::write(&log_path, log.as_bytes())?;

        self.store
            .mark_installed(hash, captured.environment, captured.filters, Some(log_path))?;

        if !self.options.keep_stage {
            let _ = fs::remove_dir_all(&stage);
        }
        info!("Installed {} into {}", node.short_spec(), prefix.display());
        Ok(())
    }

    /// Process environment plus compiler variables plus every direct
    /// dependency's runtime environment
    fn build_environment(&self, dag: &Dag, node: &ConcreteNode) -> Result<BTreeMap<String, String>> {
        let mut base: BTreeMap<String, String> = std::env::vars().collect();
        if let Some(toolchain) = self
            .options
            .toolchains
            .iter()
            .find(|t| t.compiler == node.compiler)
        {
            if let Some(cc) = &toolchain.cc {
                base.insert("CC".to_string(), cc.to_string_lossy().into_owned());
            }
            if let Some(cxx) = &toolchain.cxx {
                base.insert("CXX".to_string(), cxx.to_string_lossy().into_owned());
            }
        }

        let composer = EnvironmentComposer::new(self.store);
        let mut mods = Vec::new();
        for (dep, _) in dag.dependencies(&node.name) {
            let Some(dep_hash) = dag.hash(dep) else {
                continue;
            };
            let record = self
                .store
                .get(dep_hash)?
                .ok_or_else(|| Error::NotFound(format!("build record for {}", dep)))?;
            mods.extend(composer.compose(&record)?);
        }
        Ok(environment::apply(&mods, base))
    }
}

fn node_and_hash<'d>(dag: &'d Dag, name: &str) -> Result<(&'d ConcreteNode, &'d str)> {
    let node = dag
        .node(name)
        .ok_or_else(|| Error::NotFound(format!("{} is not in the DAG", name)))?;
    let hash = dag
        .hash(name)
        .ok_or_else(|| Error::NotFound(format!("no hash for {}", name)))?;
    Ok((node, hash))
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Write a failure log into the stage directory
fn write_log(stage: &Path, log: &str) -> Option<PathBuf> {
    fs::create_dir_all(stage).ok()?;
    let path = stage.join("build.log");
    fs::write(&path, log).ok()?;
    Some(path)
}

fn verify_checksum(recipe: &crate::recipe::Recipe, node: &ConcreteNode, archive: &Path) -> Result<()> {
    let Some(expected) = recipe
        .version_entry(&node.version)
        .and_then(|entry| entry.checksum.as_deref())
    else {
        return Ok(());
    };
    let actual = hash::sha256(&fs::read(archive)?);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::BuildFailed {
            spec: node.short_spec(),
            reason: format!("checksum mismatch: expected {}, got {}", expected, actual),
            output: String::new(),
        });
    }
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }
}
