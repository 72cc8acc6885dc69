// src/commands/env.rs
//! Runtime environment of an installed spec

use super::Session;
use anyhow::{Context, Result};
use brigade::EnvironmentComposer;
use brigade::environment::to_shell;
use std::collections::BTreeMap;

/// Print `export`/`unset` lines that reproduce the spec's runtime environment
/// on top of the current one
pub fn cmd_env(session: &Session, hash: &str) -> Result<()> {
    let store = session.store()?;
    let record = store
        .find_by_prefix(hash)
        .with_context(|| format!("No installed spec matches '{}'", hash))?;

    let mods = EnvironmentComposer::new(&store)
        .compose(&record)
        .with_context(|| format!("Failed to compose environment of {}", record.name))?;
    let base: BTreeMap<String, String> = std::env::vars().collect();
    print!("{}", to_shell(&mods, &base));
    Ok(())
}
