// src/environment/modification.rs

//! Typed environment modifications and their merge policy

use crate::spec::Spec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};

/// Separator for path-like variables
pub const PATH_SEPARATOR: char = ':';

/// Kind of an environment modification
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    Set,
    Unset,
    PrependPath,
    AppendPath,
    RemovePath,
}

/// How a later modification interacts with an earlier one on the same variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The later value replaces whatever was there
    Overwrite,
    /// The later entry is combined with the existing path list
    Accumulate,
}

impl ModificationKind {
    /// Merge policy of this kind
    pub fn merge_policy(self) -> MergePolicy {
        match self {
            Self::Set | Self::Unset => MergePolicy::Overwrite,
            Self::PrependPath | Self::AppendPath | Self::RemovePath => MergePolicy::Accumulate,
        }
    }
}

/// One environment modification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EnvironmentModification {
    Set { name: String, value: String },
    Unset { name: String },
    PrependPath { name: String, value: String },
    AppendPath { name: String, value: String },
    RemovePath { name: String, value: String },
}

impl EnvironmentModification {
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn prepend_path(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::PrependPath {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn append_path(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AppendPath {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Variable this modification touches
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. }
            | Self::Unset { name }
            | Self::PrependPath { name, .. }
            | Self::AppendPath { name, .. }
            | Self::RemovePath { name, .. } => name,
        }
    }

    /// Value carried by the modification, if any
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Unset { .. } => None,
            Self::Set { value, .. }
            | Self::PrependPath { value, .. }
            | Self::AppendPath { value, .. }
            | Self::RemovePath { value, .. } => Some(value),
        }
    }

    pub fn kind(&self) -> ModificationKind {
        match self {
            Self::Set { .. } => ModificationKind::Set,
            Self::Unset { .. } => ModificationKind::Unset,
            Self::PrependPath { .. } => ModificationKind::PrependPath,
            Self::AppendPath { .. } => ModificationKind::AppendPath,
            Self::RemovePath { .. } => ModificationKind::RemovePath,
        }
    }

    /// Replace the value through `f`, used for template rendering
    pub fn map_value<E>(
        &self,
        f: impl FnOnce(&str) -> std::result::Result<String, E>,
    ) -> std::result::Result<Self, E> {
        Ok(match self {
            Self::Set { name, value } => Self::Set {
                name: name.clone(),
                value: f(value)?,
            },
            Self::Unset { name } => Self::Unset { name: name.clone() },
            Self::PrependPath { name, value } => Self::PrependPath {
                name: name.clone(),
                value: f(value)?,
            },
            Self::AppendPath { name, value } => Self::AppendPath {
                name: name.clone(),
                value: f(value)?,
            },
            Self::RemovePath { name, value } => Self::RemovePath {
                name: name.clone(),
                value: f(value)?,
            },
        })
    }

    /// Apply this modification to an environment map
    pub fn apply_to(&self, env: &mut BTreeMap<String, String>) {
        match self {
            Self::Set { name, value } => {
                env.insert(name.clone(), value.clone());
            }
            Self::Unset { name } => {
                env.remove(name);
            }
            Self::PrependPath { name, value } => {
                let mut entries = split_path(env.get(name));
                entries.retain(|e| e != value);
                entries.insert(0, value.clone());
                env.insert(name.clone(), join_path(&entries));
            }
            Self::AppendPath { name, value } => {
                let mut entries = split_path(env.get(name));
                entries.retain(|e| e != value);
                entries.push(value.clone());
                env.insert(name.clone(), join_path(&entries));
            }
            Self::RemovePath { name, value } => {
                if env.contains_key(name) {
                    let mut entries = split_path(env.get(name));
                    entries.retain(|e| e != value);
                    env.insert(name.clone(), join_path(&entries));
                }
            }
        }
    }
}

fn split_path(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(PATH_SEPARATOR)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn join_path(entries: &[String]) -> String {
    entries.join(&PATH_SEPARATOR.to_string())
}

impl fmt::Display for EnvironmentModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{} {} {}", self.kind(), self.name(), value),
            None => write!(f, "{} {}", self.kind(), self.name()),
        }
    }
}

/// Per-recipe predicate that suppresses matching modifications
///
/// A modification is removed when its kind is listed (or no kinds are
/// listed) and its variable name contains one of `name_contains`. The filter
/// only applies when `when` holds for the package at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFilter {
    #[serde(default)]
    pub when: Option<Spec>,
    #[serde(default)]
    pub kinds: Vec<ModificationKind>,
    pub name_contains: Vec<String>,
}

impl EnvironmentFilter {
    /// Whether this filter removes `modification`
    pub fn suppresses(&self, modification: &EnvironmentModification) -> bool {
        let kind_matches = self.kinds.is_empty() || self.kinds.contains(&modification.kind());
        kind_matches
            && self
                .name_contains
                .iter()
                .any(|needle| modification.name().contains(needle.as_str()))
    }
}
