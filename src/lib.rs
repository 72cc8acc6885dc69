// src/lib.rs

//! Brigade: source-based package builder
//!
//! Turns an abstract package request such as
//! `hpctoolkit@2020.08.03 +cuda ^binutils@:2.34` into a concrete dependency
//! DAG and builds it leaf-first into per-spec install prefixes.
//!
//! # Architecture
//!
//! - Recipes: declarative, immutable package knowledge loaded from TOML
//! - Solver: backtracking concretizer over versions, variants, compilers,
//!   targets and virtual providers, with conflict chains on failure
//! - DAG: concrete nodes with canonical content hashes
//! - Orchestrator: bounded parallel builds with failure isolation
//! - Records: SQLite store keyed by canonical hash, atomic transitions
//! - Environments: typed modifications composed over runtime dependencies

pub mod build;
pub mod config;
pub mod db;
pub mod environment;
mod error;
pub mod hash;
pub mod recipe;
pub mod solver;
pub mod spec;
pub mod variant;
pub mod version;

pub use build::{BuildOptions, BuildReport, NodeOutcome, Orchestrator};
pub use config::Config;
pub use db::{BuildRecord, BuildStatus, BuildStore};
pub use environment::{EnvironmentComposer, EnvironmentModification};
pub use error::{Error, Result};
pub use recipe::{DirectoryRepository, MemoryRepository, Recipe, RecipeRepository};
pub use solver::{Conflict, Dag, Solver, SolverOptions, Unsatisfiable};
pub use spec::{ConcreteNode, Spec};
pub use version::{Version, VersionConstraint};
