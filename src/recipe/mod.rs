// src/recipe/mod.rs

//! Recipes: declarative build and dependency knowledge for one package
//!
//! A recipe lists the versions that can be built, the variants the package
//! exposes, conditional dependency and conflict rules, and rule tables that
//! turn a concrete node into build arguments and environment modifications.
//! Recipes are immutable once loaded and shared as `Arc<Recipe>`.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "hpctoolkit"
//! homepage = "http://hpctoolkit.org"
//! build_system = "autotools"
//!
//! [[versions]]
//! version = "2020.08.03"
//! commit = "d9d13c705d81e5de38e624254cf0875cce6add9a"
//!
//! [[variants]]
//! name = "cuda"
//! default = false
//! description = "Support CUDA on NVIDIA GPUs"
//!
//! [[depends]]
//! spec = "binutils@:2.34 +libiberty ~nls"
//! type = "link"
//! when = "@2020.04:2020.99"
//!
//! [[depends]]
//! spec = "cuda"
//! when = "+cuda"
//!
//! [[conflicts]]
//! spec = "+cuda"
//! when = "@:2019.99.99"
//! msg = "cuda requires 2020.03.01 or later"
//!
//! [[args]]
//! values = ["--with-binutils=%(binutils.prefix)s"]
//!
//! [[args]]
//! when = "+cuda"
//! values = ["--with-cuda=%(cuda.prefix)s"]
//!
//! [[environment_filter]]
//! kinds = ["set"]
//! name_contains = ["ROCM", "HIP", "CUDA"]
//! ```

mod format;
pub mod parser;
mod repository;
pub mod template;

pub use format::{
    ArgumentRule, BuildSystem, ConflictRule, DependencyRule, PackageSection, Recipe, VersionEntry,
};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use repository::{DirectoryRepository, MemoryRepository, RecipeRepository};
pub use template::{TemplateVars, render};
