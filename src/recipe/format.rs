// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files describing one package: the versions that can be
//! built, its variants, conditional dependency and conflict rules, and data
//! driven tables that turn a concrete node into build arguments and runtime
//! environment modifications.

use crate::environment::{EnvironmentFilter, EnvironmentModification};
use crate::hash::FieldHasher;
use crate::spec::{DepTypes, Spec, VersionSource, default_dep_types, parse_dep_types};
use crate::variant::VariantDecl;
use crate::version::Version;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display, EnumString};

/// A complete recipe for one package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    pub package: PackageSection,

    /// Buildable versions, preferred first
    #[serde(default)]
    pub versions: Vec<VersionEntry>,

    /// Declared variants in declaration order
    #[serde(default)]
    pub variants: Vec<VariantDecl>,

    /// Conditional dependency rules
    #[serde(default)]
    pub depends: Vec<DependencyRule>,

    /// Conflict rules: the package must never satisfy `spec` while `when` holds
    #[serde(default)]
    pub conflicts: Vec<ConflictRule>,

    /// Build-argument rule table
    #[serde(default)]
    pub args: Vec<ArgumentRule>,

    /// Runtime environment modifications for consumers
    #[serde(default)]
    pub environment: Vec<EnvironmentModification>,

    /// Filters applied to the composed runtime environment
    #[serde(default, rename = "environment_filter")]
    pub environment_filters: Vec<EnvironmentFilter>,

    /// Named values other recipes can reference as `%(name.attr)s`
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Package metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    /// Repository the version commits and branches refer to
    #[serde(default)]
    pub git: Option<String>,

    #[serde(default)]
    pub maintainers: Vec<String>,

    #[serde(default)]
    pub build_system: BuildSystem,

    /// Virtual packages this recipe can stand in for, e.g. `mpi`
    #[serde(default)]
    pub provides: Vec<String>,
}

/// Build system driving the configure/build/install phases
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    #[default]
    Autotools,
    Cmake,
    Makefile,
}

/// One buildable version and where its source comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: Version,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Checksum of the `url` archive, e.g. `sha256:...`
    #[serde(default)]
    pub checksum: Option<String>,
}

impl VersionEntry {
    /// Source reference of this version
    pub fn source(&self) -> VersionSource {
        if let Some(commit) = &self.commit {
            VersionSource::Commit(commit.clone())
        } else if let Some(branch) = &self.branch {
            VersionSource::Branch(branch.clone())
        } else if let Some(tag) = &self.tag {
            VersionSource::Tag(tag.clone())
        } else if let Some(url) = &self.url {
            VersionSource::Url(url.clone())
        } else {
            VersionSource::None
        }
    }

    /// Number of source references given
    pub(super) fn source_count(&self) -> usize {
        [&self.commit, &self.branch, &self.tag, &self.url]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }
}

/// `depends_on(spec, when=..., type=...)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRule {
    /// Constraint on the dependency; its name may be a virtual
    pub spec: Spec,
    /// Predicate over this package; `None` means always
    #[serde(default)]
    pub when: Option<Spec>,
    #[serde(
        rename = "type",
        default = "default_dep_types",
        deserialize_with = "deserialize_dep_types"
    )]
    pub types: DepTypes,
}

impl DependencyRule {
    /// Name of the dependency this rule introduces
    pub fn dependency_name(&self) -> &str {
        self.spec.name.as_deref().unwrap_or_default()
    }
}

/// `conflicts(spec, when=..., msg=...)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRule {
    pub spec: Spec,
    #[serde(default)]
    pub when: Option<Spec>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Build arguments emitted when `when` holds and `unless` does not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentRule {
    #[serde(default)]
    pub when: Option<Spec>,
    #[serde(default)]
    pub unless: Option<Spec>,
    pub values: Vec<String>,
}

fn deserialize_dep_types<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DepTypes, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        One(String),
        Many(Vec<String>),
    }

    let text = match Field::deserialize(deserializer)? {
        Field::One(s) => s,
        Field::Many(list) => list.join(","),
    };
    parse_dep_types(&text).map_err(serde::de::Error::custom)
}

impl Recipe {
    /// Package name
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Look up a declared variant
    pub fn variant(&self, name: &str) -> Option<&VariantDecl> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Look up a version entry
    pub fn version_entry(&self, version: &Version) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| &v.version == version)
    }

    /// Whether this recipe provides the given virtual
    pub fn provides(&self, virtual_name: &str) -> bool {
        self.package.provides.iter().any(|p| p == virtual_name)
    }

    /// Fingerprint of everything in the recipe that affects a build
    ///
    /// Metadata such as description, homepage and maintainers is excluded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = FieldHasher::new();
        hasher
            .field("name", &self.package.name)
            .field("build_system", self.package.build_system.as_ref());
        for provided in &self.package.provides {
            hasher.field("provides", provided);
        }
        for entry in &self.versions {
            hasher.field("version", &format!("{} {}", entry.version, entry.source()));
            if let Some(checksum) = &entry.checksum {
                hasher.field("checksum", checksum);
            }
        }
        for decl in &self.variants {
            hasher.field(
                "variant",
                &format!("{} {} {}", decl.name, decl.default, decl.values.join(",")),
            );
        }
        for rule in &self.depends {
            hasher.field("depends", &rule_text(&rule.spec, rule.when.as_ref()));
            let types: Vec<&str> = rule.types.iter().map(|t| t.as_ref()).collect();
            hasher.field("type", &types.join(","));
        }
        for rule in &self.conflicts {
            hasher.field("conflicts", &rule_text(&rule.spec, rule.when.as_ref()));
        }
        for rule in &self.args {
            let when = rule.when.as_ref().map(ToString::to_string).unwrap_or_default();
            let unless = rule.unless.as_ref().map(ToString::to_string).unwrap_or_default();
            hasher.field("args", &format!("{}|{}|{}", when, unless, rule.values.join(" ")));
        }
        for modification in &self.environment {
            hasher.field("environment", &modification.to_string());
        }
        for filter in &self.environment_filters {
            let when = filter.when.as_ref().map(ToString::to_string).unwrap_or_default();
            let kinds: Vec<&str> = filter.kinds.iter().map(|k| k.as_ref()).collect();
            hasher.field(
                "environment_filter",
                &format!("{}|{}|{}", when, kinds.join(","), filter.name_contains.join(",")),
            );
        }
        for (key, value) in &self.attributes {
            hasher.field(&format!("attribute.{}", key), value);
        }
        hasher.finish()
    }
}

fn rule_text(spec: &Spec, when: Option<&Spec>) -> String {
    match when {
        Some(when) => format!("{} when {}", spec, when),
        None => spec.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe;
    use crate::spec::DepType;

    const RECIPE: &str = r#"
[package]
name = "xz"
description = "General-purpose data compression"
homepage = "https://tukaani.org/xz/"

[[versions]]
version = "5.2.5"
url = "https://tukaani.org/xz/xz-5.2.5.tar.bz2"
checksum = "sha256:5117f930900b341493827d63aa910ff5e011e0b994197c3b71c08a20228a42df"

[[versions]]
version = "5.2.4"
tag = "v5.2.4"

[[variants]]
name = "pic"
default = false
description = "Compile with position independent code"

[[depends]]
spec = "libiconv"
type = ["build", "run"]

[[args]]
when = "+pic"
values = ["--with-pic"]
"#;

    #[test]
    fn test_parse_sections() {
        let recipe = parse_recipe(RECIPE).unwrap();
        assert_eq!(recipe.name(), "xz");
        assert_eq!(recipe.package.build_system, BuildSystem::Autotools);
        assert_eq!(recipe.versions.len(), 2);
        assert_eq!(
            recipe.versions[1].source(),
            VersionSource::Tag("v5.2.4".to_string())
        );
        assert!(recipe.variant("pic").is_some());

        let rule = &recipe.depends[0];
        assert_eq!(rule.dependency_name(), "libiconv");
        assert!(rule.types.contains(&DepType::Run));
        assert!(!rule.types.contains(&DepType::Link));
    }

    #[test]
    fn test_fingerprint_ignores_metadata() {
        let a = parse_recipe(RECIPE).unwrap();
        let mut b = a.clone();
        b.package.description = Some("Something else".to_string());
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.args[0].values.push("--enable-static".to_string());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_default_dep_type() {
        let recipe = parse_recipe(
            r#"
[package]
name = "a"

[[versions]]
version = "1.0"

[[depends]]
spec = "b"
"#,
        )
        .unwrap();
        assert_eq!(recipe.depends[0].types, default_dep_types());
    }
}
