// src/commands/install.rs
//! Concretize and build

use super::{Session, build_request};
use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use brigade::build::ProcessTool;
use brigade::db::StoreLock;
use brigade::Orchestrator;
use tracing::info;

/// Some nodes of an install did not build
#[derive(Debug, thiserror::Error)]
#[error("Installing {root} failed: {failed} package(s) failed to build")]
pub struct InstallFailed {
    pub root: String,
    pub failed: usize,
}

/// Concretize a spec and build everything in its DAG that is not installed
pub fn cmd_install(
    session: &Session,
    spec: &[String],
    global: &GlobalArgs,
    force: bool,
    keep_stage: bool,
) -> Result<()> {
    let request = build_request(spec, global)?;
    info!("Installing {}", request);

    let dag = session.solver()?.resolve(&request)?;
    info!(
        "Concretized {} into {} package(s)",
        dag.root_node().short_spec(),
        dag.len()
    );

    let layout = session.config.layout();
    let _lock = StoreLock::acquire(&layout)
        .with_context(|| format!("Failed to lock store at {}", layout.root().display()))?;
    let store = session.store()?;

    let mut options = session.config.build_options(session.toolchains.clone());
    options.force = force;
    options.keep_stage |= keep_stage;

    let tool = ProcessTool;
    let orchestrator = Orchestrator::new(&session.repository, &store, &tool, layout, options);
    let report = orchestrator.build(&dag)?;
    println!("{}", report);

    if !report.success() {
        return Err(InstallFailed {
            root: dag.root_node().short_spec(),
            failed: report.failures().count(),
        }
        .into());
    }

    if let Some(prefix) = orchestrator.prefix_of(&dag, dag.root()) {
        println!("{} installed at {}", dag.root_node().short_spec(), prefix.display());
    }
    Ok(())
}
