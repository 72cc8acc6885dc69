// src/commands/info.rs
//! Recipe inspection

use super::Session;
use anyhow::{Context, Result};
use brigade::RecipeRepository;
use brigade::spec::DepTypes;

/// Show what a recipe declares, or which recipes provide a virtual
pub fn cmd_info(session: &Session, package: &str) -> Result<()> {
    let repository = &session.repository;
    if repository.is_virtual(package)? {
        println!("{} is a virtual package provided by:", package);
        for provider in repository.providers(package)? {
            println!("  {}", provider);
        }
        return Ok(());
    }

    let recipe = repository
        .load_recipe(package)
        .with_context(|| format!("Failed to load recipe '{}'", package))?;
    let info = &recipe.package;

    println!("{}  ({} build)", info.name, info.build_system);
    if let Some(description) = &info.description {
        println!("  {}", description);
    }
    if let Some(homepage) = &info.homepage {
        println!("  Homepage: {}", homepage);
    }
    if !info.maintainers.is_empty() {
        println!("  Maintainers: {}", info.maintainers.join(", "));
    }
    if !info.provides.is_empty() {
        println!("  Provides: {}", info.provides.join(", "));
    }

    println!("\nVersions:");
    for entry in &recipe.versions {
        println!("  {:<16} {}", entry.version.to_string(), entry.source());
    }

    if !recipe.variants.is_empty() {
        println!("\nVariants:");
        for variant in &recipe.variants {
            let allowed = if variant.values.is_empty() {
                String::new()
            } else {
                format!(" [{}]", variant.values.join(", "))
            };
            println!(
                "  {:<16} default={}{}  {}",
                variant.name,
                variant.default,
                allowed,
                variant.description.as_deref().unwrap_or_default()
            );
        }
    }

    if !recipe.depends.is_empty() {
        println!("\nDependencies:");
        for rule in &recipe.depends {
            let when = rule
                .when
                .as_ref()
                .map(|w| format!(" when {}", w))
                .unwrap_or_default();
            println!("  {} ({}){}", rule.spec, types_label(&rule.types), when);
        }
    }

    if !recipe.conflicts.is_empty() {
        println!("\nConflicts:");
        for rule in &recipe.conflicts {
            let when = rule
                .when
                .as_ref()
                .map(|w| format!(" when {}", w))
                .unwrap_or_default();
            match &rule.msg {
                Some(msg) => println!("  {}{}: {}", rule.spec, when, msg),
                None => println!("  {}{}", rule.spec, when),
            }
        }
    }
    Ok(())
}

fn types_label(types: &DepTypes) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
