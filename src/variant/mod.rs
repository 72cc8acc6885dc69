// src/variant/mod.rs
//! Variant declarations, values and assignment enumeration
//!
//! Variants are named build-time options. Spec-string syntax:
//! `+cuda` (on), `~cuda` or `-cuda` (off), `transcoder=iconv` (enumerated).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
}

impl VariantValue {
    /// Render as it appears in a spec string, e.g. `+cuda` or `transcoder=iconv`
    pub fn render(&self, name: &str) -> String {
        match self {
            Self::Bool(true) => format!("+{}", name),
            Self::Bool(false) => format!("~{}", name),
            Self::Single(value) => format!("{}={}", name, value),
        }
    }

    /// The value as used in build-argument templates
    pub fn as_template_value(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Single(s) => s.clone(),
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Single(s) => write!(f, "{}", s),
        }
    }
}

/// Parse one variant token: `+name`, `~name`, `-name` or `name=value`
///
/// `name=true` and `name=false` produce boolean values.
pub fn parse_variant_token(token: &str) -> Result<(String, VariantValue)> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::invalid_spec(token, "empty variant"));
    }

    let (name, value) = if let Some(rest) = token.strip_prefix('+') {
        (rest, VariantValue::Bool(true))
    } else if let Some(rest) = token.strip_prefix('~').or_else(|| token.strip_prefix('-')) {
        (rest, VariantValue::Bool(false))
    } else if let Some((name, value)) = token.split_once('=') {
        let value = match value.trim() {
            "true" | "True" => VariantValue::Bool(true),
            "false" | "False" => VariantValue::Bool(false),
            "" => return Err(Error::invalid_spec(token, "missing variant value")),
            other => VariantValue::Single(other.to_string()),
        };
        (name, value)
    } else {
        return Err(Error::invalid_spec(token, "not a variant"));
    };

    let name = name.trim();
    if !is_valid_variant_name(name) {
        return Err(Error::invalid_spec(token, "invalid variant name"));
    }
    Ok((name.to_string(), value))
}

/// Variant names are alphanumeric plus `-` and `_`
pub fn is_valid_variant_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A variant declared by a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDecl {
    pub name: String,
    pub default: VariantValue,
    /// Allowed values of an enumerated variant; empty for boolean variants
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VariantDecl {
    /// Declare a boolean variant
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            default: VariantValue::Bool(default),
            values: Vec::new(),
            description: None,
        }
    }

    /// Declare an enumerated variant
    pub fn single(
        name: impl Into<String>,
        default: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            default: VariantValue::Single(default.into()),
            values: values.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this is a boolean variant
    pub fn is_bool(&self) -> bool {
        matches!(self.default, VariantValue::Bool(_))
    }

    /// Check that a value is legal for this variant
    pub fn accepts(&self, value: &VariantValue) -> bool {
        match (&self.default, value) {
            (VariantValue::Bool(_), VariantValue::Bool(_)) => true,
            (VariantValue::Single(_), VariantValue::Single(v)) => self.values.iter().any(|a| a == v),
            _ => false,
        }
    }

    /// All values in preference order: the default first, then the others as declared
    pub fn options(&self) -> Vec<VariantValue> {
        let mut options = vec![self.default.clone()];
        match &self.default {
            VariantValue::Bool(b) => options.push(VariantValue::Bool(!b)),
            VariantValue::Single(default) => options.extend(
                self.values
                    .iter()
                    .filter(|v| *v != default)
                    .map(|v| VariantValue::Single(v.clone())),
            ),
        }
        options
    }
}

/// Enumerate total variant assignments in preference order
///
/// `pinned` values are fixed. Free variants start at their defaults; then
/// every assignment with exactly one non-default value is produced, then two,
/// up to `max_flips`. Within one flip count, variants are visited in
/// declaration order and values in declared order.
pub fn enumerate_assignments(
    decls: &[VariantDecl],
    pinned: &BTreeMap<String, VariantValue>,
    max_flips: usize,
) -> Vec<BTreeMap<String, VariantValue>> {
    let mut base = BTreeMap::new();
    let mut free: Vec<(&str, Vec<VariantValue>)> = Vec::new();

    for decl in decls {
        match pinned.get(&decl.name) {
            Some(value) => {
                base.insert(decl.name.clone(), value.clone());
            }
            None => {
                base.insert(decl.name.clone(), decl.default.clone());
                let alternates: Vec<VariantValue> = decl.options().into_iter().skip(1).collect();
                free.push((decl.name.as_str(), alternates));
            }
        }
    }

    let mut out = Vec::new();
    for flips in 0..=max_flips.min(free.len()) {
        let mut chosen = Vec::with_capacity(flips);
        collect_flips(&free, 0, flips, &mut chosen, &base, &mut out);
    }
    out
}

fn collect_flips(
    free: &[(&str, Vec<VariantValue>)],
    start: usize,
    remaining: usize,
    chosen: &mut Vec<(usize, usize)>,
    base: &BTreeMap<String, VariantValue>,
    out: &mut Vec<BTreeMap<String, VariantValue>>,
) {
    if remaining == 0 {
        let mut assignment = base.clone();
        for &(idx, alt) in chosen.iter() {
            let (name, alternates) = &free[idx];
            assignment.insert((*name).to_string(), alternates[alt].clone());
        }
        out.push(assignment);
        return;
    }

    for idx in start..free.len() {
        for alt in 0..free[idx].1.len() {
            chosen.push((idx, alt));
            collect_flips(free, idx + 1, remaining - 1, chosen, base, out);
            chosen.pop();
        }
    }
}
