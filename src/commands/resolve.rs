// src/commands/resolve.rs
//! Concretization without building

use super::{Session, build_request};
use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use tracing::info;

/// Concretize a spec and print the DAG as a tree or as JSON
pub fn cmd_resolve(session: &Session, spec: &[String], global: &GlobalArgs, json: bool) -> Result<()> {
    let request = build_request(spec, global)?;
    info!("Resolving {}", request);

    let dag = session.solver()?.resolve(&request)?;
    if json {
        println!("{}", dag.to_json().context("Failed to serialize DAG")?);
    } else {
        print!("{}", dag.render_tree());
        for (virtual_name, provider) in dag.virtuals() {
            println!("{} provided by {}", virtual_name, provider);
        }
    }
    Ok(())
}
