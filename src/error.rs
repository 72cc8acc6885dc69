// src/error.rs

//! Error types for the brigade library
//!
//! Every fallible library operation returns [`Result`]. The variants map onto
//! the failure taxonomy of the tool: resolution failures
//! ([`Error::Unsatisfiable`]) are recoverable by relaxing the request, recipe
//! data errors ([`Error::RecipeMalformed`]) are fatal for that recipe only,
//! build failures are scoped to one node, and cache corruption needs a forced
//! rebuild.

use crate::solver::Unsatisfiable;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Library error
#[derive(Debug, Error)]
pub enum Error {
    #[error("Recipe not found: {0}")]
    RecipeNotFound(String),

    #[error("Recipe {recipe} is malformed: {reason}")]
    RecipeMalformed { recipe: String, reason: String },

    #[error("{0}")]
    Unsatisfiable(Box<Unsatisfiable>),

    #[error("Invalid spec '{input}': {reason}")]
    InvalidSpec { input: String, reason: String },

    #[error("Invalid dependency DAG: {0}")]
    InvalidDag(String),

    #[error("Build of {spec} failed: {reason}")]
    BuildFailed {
        spec: String,
        reason: String,
        output: String,
    },

    #[error("Build record {hash} is inconsistent with the filesystem: {reason}")]
    CacheCorruption { hash: String, reason: String },

    #[error("{name} is required by {}; use --force to remove it anyway", .dependents.join(", "))]
    HasDependents { name: String, dependents: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store at {0} is locked by another process")]
    StoreLocked(PathBuf),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a malformed-recipe error
    pub fn malformed(recipe: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RecipeMalformed {
            recipe: recipe.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a spec parse error
    pub fn invalid_spec(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came out of concretization
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::Unsatisfiable(_)
                | Self::RecipeNotFound(_)
                | Self::RecipeMalformed { .. }
                | Self::InvalidSpec { .. }
        )
    }
}

impl From<Unsatisfiable> for Error {
    fn from(value: Unsatisfiable) -> Self {
        Self::Unsatisfiable(Box::new(value))
    }
}
