// src/commands/uninstall.rs
//! Removal of installed specs

use super::Session;
use anyhow::{Context, Result};
use brigade::db::StoreLock;
use brigade::hash::short;
use std::fs;
use tracing::{info, warn};

/// Remove an installed spec and its prefix
///
/// Refused while other records depend on it unless `force` is set.
pub fn cmd_uninstall(session: &Session, hash: &str, force: bool) -> Result<()> {
    info!("Uninstalling {}", hash);

    let layout = session.config.layout();
    let _lock = StoreLock::acquire(&layout)
        .with_context(|| format!("Failed to lock store at {}", layout.root().display()))?;
    let store = session.store()?;

    let record = store
        .find_by_prefix(hash)
        .with_context(|| format!("No installed spec matches '{}'", hash))?;
    let removed = store.remove(&record.hash, force)?;

    if removed.prefix.exists() {
        fs::remove_dir_all(&removed.prefix)
            .with_context(|| format!("Failed to remove {}", removed.prefix.display()))?;
    } else {
        warn!("Prefix {} was already gone", removed.prefix.display());
    }

    println!(
        "Removed {}@{} [{}]",
        removed.name,
        removed.version,
        short(&removed.hash)
    );
    Ok(())
}
