// src/commands/mod.rs
//! Command handlers for the brigade CLI

mod completions;
mod env;
mod info;
mod install;
mod list;
mod resolve;
mod uninstall;

pub use completions::cmd_completions;
pub use env::cmd_env;
pub use info::cmd_info;
pub use install::{InstallFailed, cmd_install};
pub use list::cmd_list;
pub use resolve::cmd_resolve;
pub use uninstall::cmd_uninstall;

use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use brigade::build::Toolchain;
use brigade::spec::{CompilerSpec, TargetConstraint};
use brigade::{BuildStore, Config, DirectoryRepository, Error, Solver, Spec};
use std::collections::BTreeMap;
use tracing::debug;

/// Configuration, recipes and compilers shared by every command
pub struct Session {
    pub config: Config,
    pub repository: DirectoryRepository,
    pub toolchains: Vec<Toolchain>,
}

impl Session {
    /// Load configuration and apply command-line overrides
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let mut config =
            Config::load(global.config.as_deref()).context("Failed to load configuration")?;
        if let Some(root) = &global.root {
            config.root = root.clone();
        }
        if !global.recipes.is_empty() {
            let mut paths = global.recipes.clone();
            paths.append(&mut config.recipe_paths);
            config.recipe_paths = paths;
        }
        if let Some(jobs) = global.jobs {
            if jobs == 0 {
                anyhow::bail!("--jobs must be at least 1");
            }
            config.jobs = jobs;
        }
        if let Some(timeout) = global.timeout {
            config.build_timeout = Some(timeout);
        }

        let toolchains = config.toolchains().context("Invalid compiler configuration")?;
        debug!(
            "Store root {}, {} compiler(s), recipes from {:?}",
            config.root.display(),
            toolchains.len(),
            config.recipe_paths
        );
        let repository = DirectoryRepository::new(config.recipe_paths.clone());
        Ok(Self {
            config,
            repository,
            toolchains,
        })
    }

    pub fn solver(&self) -> Result<Solver<'_>> {
        let options = self.config.solver_options(&self.toolchains)?;
        Ok(Solver::new(&self.repository, options))
    }

    pub fn store(&self) -> Result<BuildStore> {
        let path = self.config.layout().db_path();
        BuildStore::open(&path)
            .with_context(|| format!("Failed to open build records at {}", path.display()))
    }
}

/// Join the spec words and fold in `--variant`, `--target` and `--compiler`
///
/// A `--variant` naming another package becomes a `^dependency` constraint.
pub fn build_request(words: &[String], global: &GlobalArgs) -> brigade::Result<Spec> {
    let text = words.join(" ");
    let mut request = Spec::parse(&text)?;
    let root = request
        .name
        .clone()
        .ok_or_else(|| Error::invalid_spec(&text, "the request must name a package"))?;

    for flag in &global.variants {
        let extra = Spec::parse(flag)?;
        if extra.has_dependency_constraints()
            || !extra.versions.is_any()
            || extra.compiler.is_some()
            || extra.target.is_some()
        {
            return Err(Error::invalid_spec(flag, "--variant accepts only variants"));
        }
        let spec = match extra.name.as_deref() {
            None => &mut request,
            Some(name) if name == root => &mut request,
            Some(name) => request
                .dependencies
                .entry(name.to_string())
                .or_insert_with(|| Spec::named(name)),
        };
        merge_variants(&mut spec.variants, extra.variants, flag)?;
    }

    if let Some(target) = &global.target {
        let target_constraint = TargetConstraint::parse(target)?;
        match &request.target {
            Some(existing) if *existing != target_constraint => {
                return Err(Error::invalid_spec(
                    target,
                    format!("the request already requires target {}", existing),
                ));
            }
            _ => request.target = Some(target_constraint),
        }
    }

    if let Some(compiler) = &global.compiler {
        let compiler_spec = CompilerSpec::parse(compiler)?;
        match &request.compiler {
            Some(existing) if *existing != compiler_spec => {
                return Err(Error::invalid_spec(
                    compiler,
                    format!("the request already requires {}", existing),
                ));
            }
            _ => request.compiler = Some(compiler_spec),
        }
    }

    Ok(request)
}

fn merge_variants(
    into: &mut BTreeMap<String, brigade::variant::VariantValue>,
    extra: BTreeMap<String, brigade::variant::VariantValue>,
    flag: &str,
) -> brigade::Result<()> {
    for (name, value) in extra {
        if let Some(existing) = into.get(&name)
            && *existing != value
        {
            return Err(Error::invalid_spec(
                flag,
                format!("variant {} is already {}", name, existing),
            ));
        }
        into.insert(name, value);
    }
    Ok(())
}
