// src/environment/mod.rs

//! Runtime environments of installed packages
//!
//! Each record stores the modifications captured when it was installed.
//! Composing a record's environment walks its link and run dependencies
//! leaves-first, each once, appends the record's own modifications and then
//! drops whatever the record's filters suppress. Application is an ordinary
//! left fold, so the result never depends on hidden shared state.

mod capture;
mod modification;

pub use capture::{Captured, capture, prefix_inspections};
pub use modification::{
    EnvironmentFilter, EnvironmentModification, MergePolicy, ModificationKind, PATH_SEPARATOR,
};

use crate::db::{BuildRecord, BuildStatus, BuildStore};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Composes runtime environments from installed records
pub struct EnvironmentComposer<'a> {
    store: &'a BuildStore,
}

impl<'a> EnvironmentComposer<'a> {
    pub fn new(store: &'a BuildStore) -> Self {
        Self { store }
    }

    /// Modifications needed to use `record` at runtime
    pub fn compose(&self, record: &BuildRecord) -> Result<Vec<EnvironmentModification>> {
        if record.status != BuildStatus::Installed {
            return Err(Error::NotFound(format!(
                "{} ({}) is {}, not installed",
                record.name,
                crate::hash::short(&record.hash),
                record.status
            )));
        }

        let mut seen = BTreeSet::new();
        let mut mods = Vec::new();
        for dep in record.dependencies.iter().filter(|d| d.is_runtime()) {
            self.collect(&dep.hash, &record.hash, &mut seen, &mut mods)?;
        }
        mods.extend(record.environment.iter().cloned());

        mods.retain(|m| !record.filters.iter().any(|f| f.suppresses(m)));
        Ok(mods)
    }

    /// Post-order walk over runtime dependencies
    fn collect(
        &self,
        hash: &str,
        parent: &str,
        seen: &mut BTreeSet<String>,
        mods: &mut Vec<EnvironmentModification>,
    ) -> Result<()> {
        if !seen.insert(hash.to_string()) {
            return Ok(());
        }
        let record = self.store.get(hash)?.ok_or_else(|| Error::CacheCorruption {
            hash: parent.to_string(),
            reason: format!("dependency record {} is missing", crate::hash::short(hash)),
        })?;
        if record.status != BuildStatus::Installed {
            return Err(Error::CacheCorruption {
                hash: parent.to_string(),
                reason: format!("dependency {} is {}", record.name, record.status),
            });
        }
        for dep in record.dependencies.iter().filter(|d| d.is_runtime()) {
            self.collect(&dep.hash, &record.hash, seen, mods)?;
        }
        mods.extend(record.environment.iter().cloned());
        Ok(())
    }
}

/// Fold modifications over a base environment
pub fn apply(
    mods: &[EnvironmentModification],
    base: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    mods.iter().fold(base, |mut env, m| {
        m.apply_to(&mut env);
        env
    })
}

/// Render modifications as POSIX shell lines
///
/// The modifications are applied over `base` and every variable they touch
/// is exported with its final value, or unset if it ended up absent.
pub fn to_shell(mods: &[EnvironmentModification], base: &BTreeMap<String, String>) -> String {
    let result = apply(mods, base.clone());
    let touched: BTreeSet<&str> = mods.iter().map(|m| m.name()).collect();

    let mut out = String::new();
    for name in touched {
        match result.get(name) {
            Some(value) => {
                let _ = writeln!(out, "export {}={}", name, shell_quote(value));
            }
            None => {
                let _ = writeln!(out, "unset {}", name);
            }
        }
    }
    out
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_a_fold() {
        let mods = vec![
            EnvironmentModification::set("CC", "gcc"),
            EnvironmentModification::prepend_path("PATH", "/opt/a/bin"),
            EnvironmentModification::set("CC", "clang"),
        ];
        let mut base = BTreeMap::new();
        base.insert("PATH".to_string(), "/usr/bin".to_string());

        let env = apply(&mods, base);
        assert_eq!(env["CC"], "clang");
        assert_eq!(env["PATH"], "/opt/a/bin:/usr/bin");
    }

    #[test]
    fn test_to_shell() {
        let mods = vec![
            EnvironmentModification::prepend_path("PATH", "/opt/a/bin"),
            EnvironmentModification::set("MSG", "it's"),
            EnvironmentModification::Unset {
                name: "CUDA_HOME".to_string(),
            },
        ];
        let mut base = BTreeMap::new();
        base.insert("PATH".to_string(), "/usr/bin".to_string());
        base.insert("CUDA_HOME".to_string(), "/opt/cuda".to_string());

        let shell = to_shell(&mods, &base);
        assert_eq!(
            shell,
            "unset CUDA_HOME\nexport MSG='it'\\''s'\nexport PATH='/opt/a/bin:/usr/bin'\n"
        );
    }
}
