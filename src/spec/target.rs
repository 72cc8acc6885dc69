// src/spec/target.rs

//! Target architectures and microarchitecture families
//!
//! A concrete node carries one target name. Constraints are either exact
//! (`target=haswell`) or family-inclusive (`target=x86_64:` accepts
//! `x86_64` itself and every microarchitecture descending from it).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known microarchitectures and the generic family they descend from
const MICROARCHITECTURES: &[(&str, &str)] = &[
    ("x86_64_v2", "x86_64"),
    ("x86_64_v3", "x86_64"),
    ("x86_64_v4", "x86_64"),
    ("nehalem", "x86_64"),
    ("sandybridge", "x86_64"),
    ("haswell", "x86_64"),
    ("skylake", "x86_64"),
    ("icelake", "x86_64"),
    ("zen", "x86_64"),
    ("zen2", "x86_64"),
    ("zen3", "x86_64"),
    ("neoverse_n1", "aarch64"),
    ("neoverse_v1", "aarch64"),
    ("a64fx", "aarch64"),
    ("m1", "aarch64"),
    ("power8le", "ppc64le"),
    ("power9le", "ppc64le"),
];

/// Family of a target name; generic names are their own family
pub fn family(target: &str) -> &str {
    let target = normalize(target);
    MICROARCHITECTURES
        .iter()
        .find(|(name, _)| *name == target)
        .map(|(_, family)| *family)
        .unwrap_or(target)
}

/// Map common aliases to their canonical name
pub fn normalize(target: &str) -> &str {
    match target {
        "amd64" | "x64" => "x86_64",
        "arm64" => "aarch64",
        other => other,
    }
}

/// Target of the running host
pub fn host_target() -> String {
    normalize(std::env::consts::ARCH).to_string()
}

/// A target requirement from a spec string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetConstraint {
    pub name: String,
    /// Trailing `:`: the target or anything descending from it
    pub descendants: bool,
}

impl TargetConstraint {
    /// Parse `x86_64` or `x86_64:`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, descendants) = match s.strip_suffix(':') {
            Some(name) => (name, true),
            None => (s, false),
        };
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::invalid_spec(s, "invalid target"));
        }
        Ok(Self {
            name: normalize(name).to_string(),
            descendants,
        })
    }

    /// Check a concrete target against this constraint
    pub fn matches(&self, target: &str) -> bool {
        let target = normalize(target);
        if target == self.name {
            return true;
        }
        self.descendants && family(target) == self.name
    }
}

impl fmt::Display for TargetConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.descendants {
            write!(f, ":")?;
        }
        Ok(())
    }
}
