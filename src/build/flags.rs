// src/build/flags.rs

//! Template variables and build arguments for one node
//!
//! Arguments come from the recipe's rule table: every rule whose `when`
//! holds and whose `unless` does not contributes its rendered values, in
//! declaration order.

use crate::error::Result;
use crate::recipe::{Recipe, RecipeRepository, TemplateVars, render};
use crate::solver::Dag;
use crate::spec::{ConcreteNode, NodeLookup};
use std::path::{Path, PathBuf};

/// Variables describing a node itself
pub fn node_vars(node: &ConcreteNode, prefix: &Path, make_jobs: usize) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("name".to_string(), node.name.clone());
    vars.insert("version".to_string(), node.version.to_string());
    vars.insert("prefix".to_string(), prefix.to_string_lossy().into_owned());
    vars.insert("jobs".to_string(), make_jobs.to_string());
    vars.insert("target".to_string(), node.target.clone());
    vars.insert("compiler".to_string(), node.compiler.to_string());
    vars.insert("compiler.name".to_string(), node.compiler.name.clone());
    vars.insert("compiler.version".to_string(), node.compiler.version.to_string());
    for (variant, value) in &node.variants {
        vars.insert(format!("variants.{}", variant), value.as_template_value());
    }
    vars
}

/// Variables for building `name`: its own plus every dependency's
///
/// Each dependency `d` contributes `d.name`, `d.version`, `d.prefix` and
/// its recipe attributes rendered against its own variables. A virtual
/// bound to `d` gets the same keys under the virtual's name.
pub fn template_vars(
    dag: &Dag,
    name: &str,
    repository: &dyn RecipeRepository,
    prefix_of: impl Fn(&str) -> Option<PathBuf>,
    make_jobs: usize,
) -> Result<TemplateVars> {
    let node = dag
        .node(name)
        .ok_or_else(|| crate::error::Error::NotFound(format!("{} is not in the DAG", name)))?;
    let own_prefix = prefix_of(name).unwrap_or_default();
    let mut vars = node_vars(node, &own_prefix, make_jobs);

    for dep in dag.dependency_closure(name) {
        let Some(dep_node) = dag.node(&dep) else {
            continue;
        };
        let dep_prefix = prefix_of(&dep).unwrap_or_default();
        let recipe = repository.load_recipe(&dep)?;
        let dep_vars = dependency_vars(&recipe, dep_node, &dep_prefix, make_jobs)?;

        let aliases = dag
            .virtuals()
            .iter()
            .filter(|(_, provider)| **provider == dep)
            .map(|(virtual_name, _)| virtual_name.clone());
        for key in std::iter::once(dep.clone()).chain(aliases) {
            for (field, value) in &dep_vars {
                vars.insert(format!("{}.{}", key, field), value.clone());
            }
        }
    }
    Ok(vars)
}

fn dependency_vars(
    recipe: &Recipe,
    node: &ConcreteNode,
    prefix: &Path,
    make_jobs: usize,
) -> Result<TemplateVars> {
    let own = node_vars(node, prefix, make_jobs);
    let mut fields = TemplateVars::new();
    for key in ["name", "version", "prefix"] {
        if let Some(value) = own.get(key) {
            fields.insert(key.to_string(), value.clone());
        }
    }
    for (attribute, template) in &recipe.attributes {
        fields.insert(attribute.clone(), render(recipe.name(), template, &own)?);
    }
    Ok(fields)
}

/// Evaluate the recipe's argument rules for `node`
pub fn render_arguments(
    recipe: &Recipe,
    node: &ConcreteNode,
    lookup: &dyn NodeLookup,
    vars: &TemplateVars,
) -> Result<Vec<String>> {
    let mut args = Vec::new();
    for rule in &recipe.args {
        let when = rule.when.as_ref().is_none_or(|w| w.satisfied_by(node, lookup));
        let unless = rule.unless.as_ref().is_some_and(|u| u.satisfied_by(node, lookup));
        if !when || unless {
            continue;
        }
        for value in &rule.values {
            args.push(render(recipe.name(), value, vars)?);
        }
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{MemoryRepository, parse_recipe};
    use crate::solver::{Solver, SolverOptions};
    use crate::spec::{Compiler, Spec};
    use crate::version::Version;

    const TOOL: &str = r#"
[package]
name = "tool"

[[versions]]
version = "1.0"

[[variants]]
name = "mpi"
default = false

[[depends]]
spec = "mpi"
when = "+mpi"

[[args]]
values = ["--prefix-is=%(prefix)s"]

[[args]]
when = "+mpi"
values = ["MPICXX=%(mpi.mpicxx)s"]

[[args]]
unless = "+mpi"
values = ["--without-mpi"]
"#;

    const OPENMPI: &str = r#"
[package]
name = "openmpi"
provides = ["mpi"]

[[versions]]
version = "4.0.5"

[attributes]
mpicxx = "%(prefix)s/bin/mpicxx"
"#;

    fn dag(request: &str) -> (MemoryRepository, Dag) {
        let repo = MemoryRepository::from_toml([TOOL, OPENMPI]).unwrap();
        let options = SolverOptions {
            compilers: vec![Compiler {
                name: "gcc".to_string(),
                version: Version::parse("9.3.0").unwrap(),
            }],
            default_target: "x86_64".to_string(),
            ..Default::default()
        };
        let dag = Solver::new(&repo, options)
            .resolve(&Spec::parse(request).unwrap())
            .unwrap();
        (repo, dag)
    }

    fn prefix(name: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("/opt/{}", name)))
    }

    #[test]
    fn test_virtual_attribute_through_provider() {
        let (repo, dag) = dag("tool +mpi");
        let vars = template_vars(&dag, "tool", &repo, prefix, 8).unwrap();
        assert_eq!(vars["mpi.mpicxx"], "/opt/openmpi/bin/mpicxx");
        assert_eq!(vars["openmpi.prefix"], "/opt/openmpi");
        assert_eq!(vars["variants.mpi"], "true");

        let recipe = parse_recipe(TOOL).unwrap();
        let args = render_arguments(&recipe, dag.root_node(), &dag, &vars).unwrap();
        assert_eq!(
            args,
            vec!["--prefix-is=/opt/tool", "MPICXX=/opt/openmpi/bin/mpicxx"]
        );
    }

    #[test]
    fn test_unless_rule() {
        let (repo, dag) = dag("tool");
        let vars = template_vars(&dag, "tool", &repo, prefix, 8).unwrap();
        let recipe = parse_recipe(TOOL).unwrap();
        let args = render_arguments(&recipe, dag.root_node(), &dag, &vars).unwrap();
        assert_eq!(args, vec!["--prefix-is=/opt/tool", "--without-mpi"]);
    }
}
