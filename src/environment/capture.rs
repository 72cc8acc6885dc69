// src/environment/capture.rs

//! Install-time capture of a package's own environment modifications

use super::{EnvironmentFilter, EnvironmentModification};
use crate::error::Result;
use crate::recipe::{Recipe, TemplateVars, render};
use crate::spec::{ConcreteNode, NodeLookup};
use std::path::Path;
use tracing::debug;

/// Prefix subdirectory → path variable it is prepended to
const INSPECTIONS: &[(&str, &str)] = &[
    ("bin", "PATH"),
    ("share/man", "MANPATH"),
    ("man", "MANPATH"),
    ("lib/pkgconfig", "PKG_CONFIG_PATH"),
    ("lib64/pkgconfig", "PKG_CONFIG_PATH"),
];

/// What gets stored on a record once its build succeeds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captured {
    pub environment: Vec<EnvironmentModification>,
    pub filters: Vec<EnvironmentFilter>,
}

/// Path modifications implied by the layout of an install prefix
pub fn prefix_inspections(prefix: &Path) -> Vec<EnvironmentModification> {
    let mut mods: Vec<EnvironmentModification> = INSPECTIONS
        .iter()
        .filter(|(dir, _)| prefix.join(dir).is_dir())
        .map(|(dir, var)| {
            EnvironmentModification::prepend_path(*var, prefix.join(dir).to_string_lossy())
        })
        .collect();
    mods.push(EnvironmentModification::prepend_path(
        "CMAKE_PREFIX_PATH",
        prefix.to_string_lossy(),
    ));
    mods
}

/// Capture the modifications and active filters of a freshly installed node
///
/// Prefix inspections come first, then the recipe's declared modifications
/// with templates rendered against `vars`. Filters are kept only if their
/// `when` predicate holds for `node`.
pub fn capture(
    recipe: &Recipe,
    node: &ConcreteNode,
    lookup: &dyn NodeLookup,
    prefix: &Path,
    vars: &TemplateVars,
) -> Result<Captured> {
    let mut environment = prefix_inspections(prefix);
    for modification in &recipe.environment {
        environment.push(modification.map_value(|v| render(recipe.name(), v, vars))?);
    }

    let filters: Vec<EnvironmentFilter> = recipe
        .environment_filters
        .iter()
        .filter(|f| f.when.as_ref().is_none_or(|w| w.satisfied_by(node, lookup)))
        .cloned()
        .collect();

    debug!(
        "Captured {} modifications and {} filters for {}",
        environment.len(),
        filters.len(),
        node.name
    );
    Ok(Captured {
        environment,
        filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_prefix_inspections() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::create_dir_all(dir.path().join("lib64/pkgconfig")).unwrap();

        let mods = prefix_inspections(dir.path());
        let names: Vec<&str> = mods.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["PATH", "PKG_CONFIG_PATH", "CMAKE_PREFIX_PATH"]);
        assert_eq!(
            mods[0].value().unwrap(),
            dir.path().join("bin").to_string_lossy()
        );
    }
}
