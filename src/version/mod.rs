// src/version/mod.rs

//! Version handling and constraint satisfaction for recipe versions
//!
//! Recipe versions are not semver. They mix dated releases (`2020.08.03`),
//! dotted releases (`1.4.1`), pre-release tags (`1.0rc1`) and branch names
//! (`develop`, `master`). This module provides:
//!
//! - [`Version`]: ordered version with numeric and alphabetic components
//! - [`VersionRange`]: inclusive `lo:hi` range with prefix-inclusive upper bound
//! - [`VersionConstraint`]: union of exact versions and ranges
//!
//! # Constraint syntax
//!
//! | Text | Meaning |
//! |------|---------|
//! | `1.4` | 1.4 or any 1.4.x |
//! | `=1.4` | exactly 1.4 |
//! | `1.4:` | 1.4 or newer |
//! | `:2.33.1` | up to 2.33.1, including 2.33.1.x |
//! | `2020.04:2020.99` | between the two, inclusive |
//! | `1.0:1.4,2.0` | union of alternatives |

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Branch-style versions that sort above every release, highest first
pub const INFINITY_VERSIONS: [&str; 5] = ["develop", "main", "master", "head", "trunk"];

/// A single component of a version
///
/// Alphabetic components sort below numeric ones, so `1.0rc1 < 1.0.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionComponent {
    Alpha(String),
    Number(u64),
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A parsed package version
///
/// Equality and ordering only consider the parsed components, so `2020.04`
/// and `2020.4` are the same version. The original text is kept for display.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    components: Vec<VersionComponent>,
}

impl Version {
    /// Parse a version string
    ///
    /// Components are separated by `.`, `-` or `_`; a transition between
    /// digits and letters also starts a new component (`1.0rc1` is
    /// `1`, `0`, `rc`, `1`).
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Err(Error::invalid_spec(s, "empty version"));
        }

        let mut components = Vec::new();
        for segment in text.split(['.', '-', '_']) {
            if segment.is_empty() {
                return Err(Error::invalid_spec(s, "empty version component"));
            }
            let mut current = String::new();
            let mut current_is_digit = None;
            for c in segment.chars() {
                if !c.is_ascii_alphanumeric() {
                    return Err(Error::invalid_spec(
                        s,
                        format!("invalid character '{}' in version", c),
                    ));
                }
                let is_digit = c.is_ascii_digit();
                if current_is_digit.is_some_and(|d| d != is_digit) {
                    components.push(Self::component(&current, s)?);
                    current.clear();
                }
                current_is_digit = Some(is_digit);
                current.push(c);
            }
            components.push(Self::component(&current, s)?);
        }

        Ok(Self {
            text: text.to_string(),
            components,
        })
    }

    fn component(part: &str, input: &str) -> Result<VersionComponent> {
        if part.bytes().all(|b| b.is_ascii_digit()) {
            part.parse::<u64>()
                .map(VersionComponent::Number)
                .map_err(|e| Error::invalid_spec(input, format!("bad version number: {}", e)))
        } else {
            Ok(VersionComponent::Alpha(part.to_ascii_lowercase()))
        }
    }

    /// The version as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parsed components
    pub fn components(&self) -> &[VersionComponent] {
        &self.components
    }

    /// Rank among [`INFINITY_VERSIONS`] (higher sorts later), if this is one
    fn infinity_rank(&self) -> Option<usize> {
        let lower = self.text.to_ascii_lowercase();
        INFINITY_VERSIONS
            .iter()
            .position(|name| *name == lower)
            .map(|idx| INFINITY_VERSIONS.len() - idx)
    }

    /// Whether this is a branch-style version such as `develop`
    pub fn is_infinity(&self) -> bool {
        self.infinity_rank().is_some()
    }

    /// Whether this version's components are a prefix of `other`'s
    ///
    /// `2.33` is a prefix of `2.33.1`, and every version is a prefix of
    /// itself.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        if self.is_infinity() || other.is_infinity() {
            return self == other;
        }
        other.components.len() >= self.components.len()
            && self.components == other.components[..self.components.len()]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.infinity_rank() {
            Some(rank) => rank.hash(state),
            None => self.components.hash(state),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.infinity_rank(), other.infinity_rank()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self.components.cmp(&other.components),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Inclusive version range `lo:hi`
///
/// Either bound may be open. The upper bound also admits versions it is a
/// prefix of, so `:2.34` includes `2.34.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lo: Option<Version>,
    pub hi: Option<Version>,
}

impl VersionRange {
    /// Check if a version falls inside this range
    pub fn contains(&self, version: &Version) -> bool {
        let above_lo = self.lo.as_ref().is_none_or(|lo| version >= lo);
        let below_hi = self
            .hi
            .as_ref()
            .is_none_or(|hi| version <= hi || hi.is_prefix_of(version));
        above_lo && below_hi
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo.is_some() && self.lo == self.hi {
            if let Some(lo) = &self.lo {
                return write!(f, "{}", lo);
            }
        }
        if let Some(lo) = &self.lo {
            write!(f, "{}", lo)?;
        }
        write!(f, ":")?;
        if let Some(hi) = &self.hi {
            write!(f, "{}", hi)?;
        }
        Ok(())
    }
}

/// One alternative inside a version constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionAlternative {
    /// `=1.4`: exactly this version
    Exact(Version),
    /// `1.4`, `1.4:`, `:2.0`, `1.0:2.0`
    Range(VersionRange),
}

impl VersionAlternative {
    fn contains(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Range(r) => r.contains(version),
        }
    }
}

impl fmt::Display for VersionAlternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "={}", v),
            Self::Range(r) => write!(f, "{}", r),
        }
    }
}

/// Version constraint: any version, or a union of alternatives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VersionConstraint {
    /// Any version is acceptable
    #[default]
    Any,
    /// At least one alternative must match
    OneOf(Vec<VersionAlternative>),
}

impl VersionConstraint {
    /// Parse the text following `@` in a spec
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == ":" || s == "*" {
            return Ok(Self::Any);
        }

        let mut alternatives = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::invalid_spec(s, "empty version alternative"));
            }

            let alt = if let Some(exact) = part.strip_prefix('=') {
                VersionAlternative::Exact(Version::parse(exact)?)
            } else if let Some((lo, hi)) = part.split_once(':') {
                let lo = (!lo.trim().is_empty()).then(|| Version::parse(lo)).transpose()?;
                let hi = (!hi.trim().is_empty()).then(|| Version::parse(hi)).transpose()?;
                if let (Some(l), Some(h)) = (&lo, &hi)
                    && l > h
                {
                    return Err(Error::invalid_spec(
                        s,
                        format!("range lower bound {} is above upper bound {}", l, h),
                    ));
                }
                VersionAlternative::Range(VersionRange { lo, hi })
            } else {
                let v = Version::parse(part)?;
                VersionAlternative::Range(VersionRange {
                    lo: Some(v.clone()),
                    hi: Some(v),
                })
            };
            alternatives.push(alt);
        }

        Ok(Self::OneOf(alternatives))
    }

    /// Constraint matching exactly one version
    pub fn exact(version: Version) -> Self {
        Self::OneOf(vec![VersionAlternative::Exact(version)])
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(alts) => alts.iter().any(|alt| alt.contains(version)),
        }
    }

    /// Whether this constraint accepts every version
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, ":"),
            Self::OneOf(alts) => {
                let parts: Vec<String> = alts.iter().map(|a| a.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn c(s: &str) -> VersionConstraint {
        VersionConstraint::parse(s).unwrap()
    }

    #[test]
    fn test_parse_components() {
        let version = v("1.0rc1");
        assert_eq!(
            version.components(),
            &[
                VersionComponent::Number(1),
                VersionComponent::Number(0),
                VersionComponent::Alpha("rc".to_string()),
                VersionComponent::Number(1),
            ]
        );
        assert_eq!(version.to_string(), "1.0rc1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.2+3").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(v("2020.08.03") > v("2020.07.21"));
        assert!(v("2.33.1") < v("2.34"));
        assert!(v("2.33") < v("2.33.1"));
        assert!(v("1.0rc1") < v("1.0.1"));
        assert_eq!(v("2020.04"), v("2020.4"));
    }

    #[test]
    fn test_infinity_versions_sort_last() {
        assert!(v("develop") > v("2020.08.03"));
        assert!(v("master") > v("9999.1"));
        assert!(v("develop") > v("master"));
        assert!(v("master") > v("trunk"));
    }

    #[test]
    fn test_prefix() {
        assert!(v("2.33").is_prefix_of(&v("2.33.1")));
        assert!(v("2.33.1").is_prefix_of(&v("2.33.1")));
        assert!(!v("2.33.1").is_prefix_of(&v("2.33")));
        assert!(!v("develop").is_prefix_of(&v("2.0")));
    }

    #[test]
    fn test_upper_bound_is_prefix_inclusive() {
        let upto = c(":2.33.1");
        assert!(upto.satisfies(&v("2.33.1")));
        assert!(upto.satisfies(&v("2.33.1.2")));
        assert!(upto.satisfies(&v("2.30")));
        assert!(!upto.satisfies(&v("2.34")));
    }

    #[test]
    fn test_lower_bound() {
        let from = c("2021.00:");
        assert!(!from.satisfies(&v("2020.08.03")));
        assert!(from.satisfies(&v("2021.02.10")));
        assert!(from.satisfies(&v("develop")));
    }

    #[test]
    fn test_closed_range() {
        let between = c("2020.04:2020.99");
        assert!(between.satisfies(&v("2020.08.03")));
        assert!(!between.satisfies(&v("2020.03.01")));
        assert!(!between.satisfies(&v("2021.02.10")));
    }

    #[test]
    fn test_bare_version_matches_prefix() {
        let bare = c("1.4");
        assert!(bare.satisfies(&v("1.4")));
        assert!(bare.satisfies(&v("1.4.2")));
        assert!(!bare.satisfies(&v("1.5")));

        let exact = c("=1.4");
        assert!(exact.satisfies(&v("1.4")));
        assert!(!exact.satisfies(&v("1.4.2")));
    }

    #[test]
    fn test_union() {
        let union = c("1.0:1.4,2.0");
        assert!(union.satisfies(&v("1.2")));
        assert!(union.satisfies(&v("2.0.1")));
        assert!(!union.satisfies(&v("1.5")));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(VersionConstraint::parse("2.0:1.0").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in [":2.33.1", "2021.00:", "1.0:1.4,2.0", "=1.4", "1.4"] {
            assert_eq!(c(text).to_string(), text);
        }
        assert_eq!(VersionConstraint::Any.to_string(), ":");
    }
}
