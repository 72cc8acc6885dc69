// src/spec/parser.rs

//! Spec string parser
//!
//! Grammar, whitespace optional between sigils:
//!
//! ```text
//! spec      := [name] ['@' versions] item* ('^' name ['@' versions] item*)*
//! item      := '+' variant | '~' variant | '-' variant | key '=' value
//!            | '%' compiler ['@' versions] | 'target=' target [':']
//! ```
//!
//! All `^` clauses attach to the root spec; items after a `^name` apply to
//! that dependency until the next `^`.

use super::{CompilerSpec, Spec, TargetConstraint};
use crate::error::{Error, Result};
use crate::variant::parse_variant_token;
use crate::version::VersionConstraint;

/// Sigils that start a new fragment inside a word
const SIGILS: [char; 4] = ['+', '~', '%', '^'];

pub(super) fn parse(input: &str) -> Result<Spec> {
    if input.trim().is_empty() {
        return Err(Error::invalid_spec(input, "empty spec"));
    }

    let mut root = Spec::default();
    let mut current_dep: Option<String> = None;

    for word in input.split_whitespace() {
        for fragment in split_fragments(word) {
            apply_fragment(input, &mut root, &mut current_dep, fragment)?;
        }
    }

    Ok(root)
}

/// Split `binutils@:2.34+libiberty~nls` into `binutils@:2.34`, `+libiberty`, `~nls`
fn split_fragments(word: &str) -> Vec<&str> {
    // key=value words keep their value intact
    if let Some((key, _)) = word.split_once('=')
        && !key.contains(SIGILS)
    {
        return vec![word];
    }

    let mut fragments = Vec::new();
    let mut start = 0;
    for (idx, c) in word.char_indices() {
        if idx > start && SIGILS.contains(&c) {
            fragments.push(&word[start..idx]);
            start = idx;
        }
    }
    fragments.push(&word[start..]);
    fragments
}

fn apply_fragment(
    input: &str,
    root: &mut Spec,
    current_dep: &mut Option<String>,
    fragment: &str,
) -> Result<()> {
    if let Some(rest) = fragment.strip_prefix('^') {
        let (name, versions) = split_name_version(input, rest)?;
        if root.name.as_deref() == Some(name.as_str()) {
            return Err(Error::invalid_spec(input, format!("{} cannot depend on itself", name)));
        }
        if root.dependencies.contains_key(&name) {
            return Err(Error::invalid_spec(
                input,
                format!("dependency {} is constrained twice", name),
            ));
        }
        let mut dep = Spec::named(name.clone());
        dep.versions = versions;
        root.dependencies.insert(name.clone(), dep);
        *current_dep = Some(name);
        return Ok(());
    }

    let spec = match current_dep.as_deref() {
        Some(name) => root
            .dependencies
            .get_mut(name)
            .ok_or_else(|| Error::invalid_spec(input, "dangling dependency"))?,
        None => root,
    };

    if let Some(rest) = fragment.strip_prefix('%') {
        if spec.compiler.is_some() {
            return Err(Error::invalid_spec(input, "more than one compiler"));
        }
        let (name, versions) = split_name_version(input, rest)?;
        spec.compiler = Some(CompilerSpec { name, versions });
        return Ok(());
    }

    if let Some(rest) = fragment.strip_prefix('@') {
        return set_versions(input, spec, rest);
    }

    if let Some(value) = fragment.strip_prefix("target=") {
        if spec.target.is_some() {
            return Err(Error::invalid_spec(input, "more than one target"));
        }
        spec.target = Some(TargetConstraint::parse(value)?);
        return Ok(());
    }

    if fragment.starts_with(['+', '~', '-']) || fragment.contains('=') {
        let (name, value) = parse_variant_token(fragment)?;
        if let Some(existing) = spec.variants.get(&name)
            && existing != &value
        {
            return Err(Error::invalid_spec(
                input,
                format!("variant {} given conflicting values", name),
            ));
        }
        spec.variants.insert(name, value);
        return Ok(());
    }

    // A bare name is only legal as the very first thing in the root spec
    if current_dep.is_none() && *spec == Spec::default() {
        let (name, versions) = split_name_version(input, fragment)?;
        spec.name = Some(name);
        spec.versions = versions;
        return Ok(());
    }

    Err(Error::invalid_spec(input, format!("unexpected '{}'", fragment)))
}

/// Parse `gcc@9:` or `%gcc@9:` on its own
pub(super) fn parse_compiler(input: &str) -> Result<CompilerSpec> {
    let text = input.trim();
    let text = text.strip_prefix('%').unwrap_or(text);
    let (name, versions) = split_name_version(input, text)?;
    Ok(CompilerSpec { name, versions })
}

fn set_versions(input: &str, spec: &mut Spec, text: &str) -> Result<()> {
    if !spec.versions.is_any() {
        return Err(Error::invalid_spec(input, "more than one version constraint"));
    }
    spec.versions = VersionConstraint::parse(text)?;
    Ok(())
}

fn split_name_version(input: &str, text: &str) -> Result<(String, VersionConstraint)> {
    let (name, versions) = match text.split_once('@') {
        Some((name, versions)) => (name, VersionConstraint::parse(versions)?),
        None => (text, VersionConstraint::Any),
    };
    if !is_valid_package_name(name) {
        return Err(Error::invalid_spec(input, format!("invalid name '{}'", name)));
    }
    Ok((name.to_string(), versions))
}

/// Package names: lowercase alphanumerics, `-`, `_` and `.`, starting alphanumeric
pub fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantValue;
    use crate::version::Version;

    #[test]
    fn test_parse_full_spec() {
        let spec = parse(
            "hpctoolkit@2020.08.03 +cuda ~papi %gcc@9: target=x86_64 ^binutils@:2.34 +libiberty",
        )
        .unwrap();

        assert_eq!(spec.name.as_deref(), Some("hpctoolkit"));
        assert!(spec.versions.satisfies(&Version::parse("2020.08.03").unwrap()));
        assert_eq!(spec.variants["cuda"], VariantValue::Bool(true));
        assert_eq!(spec.variants["papi"], VariantValue::Bool(false));
        let compiler = spec.compiler.as_ref().unwrap();
        assert_eq!(compiler.name, "gcc");
        assert_eq!(compiler.versions.to_string(), "9:");
        assert_eq!(spec.target.as_ref().unwrap().name, "x86_64");

        let binutils = &spec.dependencies["binutils"];
        assert_eq!(binutils.versions.to_string(), ":2.34");
        assert_eq!(binutils.variants["libiberty"], VariantValue::Bool(true));
        // Items after ^binutils belong to binutils, not the root
        assert!(!spec.variants.contains_key("libiberty"));
    }

    #[test]
    fn test_compact_form() {
        let spec = parse("binutils@:2.34+libiberty~nls").unwrap();
        assert_eq!(spec.name.as_deref(), Some("binutils"));
        assert_eq!(spec.variants.len(), 2);
        assert_eq!(spec.variants["nls"], VariantValue::Bool(false));
    }

    #[test]
    fn test_enumerated_variant() {
        let spec = parse("xerces-c transcoder=iconv").unwrap();
        assert_eq!(
            spec.variants["transcoder"],
            VariantValue::Single("iconv".to_string())
        );
    }

    #[test]
    fn test_anonymous_predicates() {
        let spec = parse("@2021.00:").unwrap();
        assert!(spec.name.is_none());
        assert!(!spec.versions.is_any());

        let spec = parse("+cuda").unwrap();
        assert!(spec.name.is_none());

        let spec = parse("^dyninst@10.0.0:").unwrap();
        assert!(spec.name.is_none());
        assert!(spec.dependencies.contains_key("dyninst"));

        let spec = parse("target=x86_64:").unwrap();
        assert!(spec.target.as_ref().unwrap().descendants);
    }

    #[test]
    fn test_display_is_canonical() {
        let spec = parse("hpctoolkit ~papi +cuda ^xz +pic").unwrap();
        assert_eq!(spec.to_string(), "hpctoolkit +cuda ~papi ^xz +pic");
        assert_eq!(parse(&spec.to_string()).unwrap(), spec);
        assert_eq!(parse("^dyninst@10:").unwrap().to_string(), "^dyninst@10:");
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("+cuda hpctoolkit").is_err());
        assert!(parse("a@1 @2").is_err());
        assert!(parse("a +x ~x").is_err());
        assert!(parse("a %gcc %clang").is_err());
        assert!(parse("a ^a").is_err());
        assert!(parse("a ^b ^b").is_err());
        assert!(parse("a@2:1").is_err());
        assert!(parse("Bad!Name").is_err());
    }

    #[test]
    fn test_package_names() {
        assert!(is_valid_package_name("intel-tbb"));
        assert!(is_valid_package_name("py-numpy"));
        assert!(is_valid_package_name("libmonitor"));
        assert!(!is_valid_package_name("-x"));
        assert!(!is_valid_package_name(""));
    }
}
