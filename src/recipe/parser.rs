// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::error::{Error, Result};
use crate::recipe::format::Recipe;
use crate::recipe::template::referenced_keys;
use crate::spec::Spec;
use crate::spec::is_valid_package_name;
use crate::variant::is_valid_variant_name;
use std::collections::BTreeSet;
use std::path::Path;

/// Parse a recipe from a TOML string
///
/// The result is not validated; see [`validate_recipe`].
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::malformed("<recipe>", format!("invalid TOML: {}", e)))
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        Error::malformed(path.display().to_string(), format!("invalid TOML: {}", e))
    })
}

/// Validate a recipe for internal consistency
///
/// Returns warnings for incomplete but usable recipes. Inconsistent
/// declarations fail with [`Error::RecipeMalformed`]:
///
/// - a missing or invalid name, no versions, or a duplicated version
/// - a version entry with more than one source reference
/// - duplicated or invalid variants, defaults outside the allowed values
/// - a dependency rule without a name, on itself, or whose `when` clause
///   references other packages
/// - any rule predicate referencing an undeclared variant or an illegal value
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let name = recipe.name();
    let fail = |reason: String| Err(Error::malformed(name, reason));
    let mut warnings = Vec::new();

    if !is_valid_package_name(name) {
        return fail(format!("invalid package name '{}'", name));
    }

    if recipe.versions.is_empty() {
        return fail("no versions declared".to_string());
    }
    let mut seen_versions = BTreeSet::new();
    for entry in &recipe.versions {
        if !seen_versions.insert(entry.version.clone()) {
            return fail(format!("version {} declared twice", entry.version));
        }
        if entry.source_count() > 1 {
            return fail(format!(
                "version {} has more than one source reference",
                entry.version
            ));
        }
    }

    let mut seen_variants = BTreeSet::new();
    for decl in &recipe.variants {
        if !is_valid_variant_name(&decl.name) {
            return fail(format!("invalid variant name '{}'", decl.name));
        }
        if !seen_variants.insert(decl.name.as_str()) {
            return fail(format!("variant {} declared twice", decl.name));
        }
        if decl.is_bool() && !decl.values.is_empty() {
            return fail(format!("boolean variant {} lists values", decl.name));
        }
        if !decl.is_bool() && !decl.accepts(&decl.default) {
            return fail(format!(
                "default of variant {} is not one of its values",
                decl.name
            ));
        }
        if decl.description.is_none() {
            warnings.push(format!("Variant {} has no description", decl.name));
        }
    }

    for rule in &recipe.depends {
        let dep = match rule.spec.name.as_deref() {
            Some(dep) => dep,
            None => return fail(format!("dependency '{}' has no package name", rule.spec)),
        };
        if dep == name {
            return fail("package depends on itself".to_string());
        }
        if let Some(when) = &rule.when {
            if when.has_dependency_constraints() {
                return fail(format!(
                    "dependency on {} is conditional on other packages ('{}')",
                    dep, when
                ));
            }
            check_self_predicate(recipe, when, &format!("when clause of dependency {}", dep))?;
        }
    }

    for rule in &recipe.conflicts {
        let context = format!("conflict '{}'", rule.spec);
        check_self_predicate(recipe, &rule.spec, &context)?;
        if let Some(when) = &rule.when {
            check_self_predicate(recipe, when, &context)?;
        }
    }

    let dependency_names: BTreeSet<&str> = recipe
        .depends
        .iter()
        .map(|rule| rule.dependency_name())
        .collect();
    for rule in &recipe.args {
        for predicate in [&rule.when, &rule.unless].into_iter().flatten() {
            check_self_predicate(recipe, predicate, "argument rule")?;
        }
        for value in &rule.values {
            for key in referenced_keys(value) {
                if let Some((owner, _)) = key.split_once('.')
                    && owner != "variants"
                    && !dependency_names.contains(owner)
                {
                    warnings.push(format!(
                        "Argument '{}' references {} which is never a dependency",
                        value, owner
                    ));
                }
            }
        }
    }

    for filter in &recipe.environment_filters {
        if let Some(when) = &filter.when {
            check_self_predicate(recipe, when, "environment filter")?;
        }
        if filter.name_contains.is_empty() {
            return fail("environment filter lists no variable names".to_string());
        }
    }

    if recipe.package.description.is_none() {
        warnings.push("Missing package description".to_string());
    }
    if recipe.package.homepage.is_none() {
        warnings.push("Missing package homepage".to_string());
    }

    Ok(warnings)
}

/// Check a predicate evaluated against this recipe's own node
fn check_self_predicate(recipe: &Recipe, predicate: &Spec, context: &str) -> Result<()> {
    if let Some(other) = predicate.name.as_deref()
        && other != recipe.name()
    {
        return Err(Error::malformed(
            recipe.name(),
            format!("{} names another package '{}'", context, other),
        ));
    }
    for (variant, value) in &predicate.variants {
        match recipe.variant(variant) {
            None => {
                return Err(Error::malformed(
                    recipe.name(),
                    format!("{} references undeclared variant '{}'", context, variant),
                ));
            }
            Some(decl) if !decl.accepts(value) => {
                return Err(Error::malformed(
                    recipe.name(),
                    format!(
                        "{} uses illegal value '{}' for variant '{}'",
                        context, value, variant
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
