// src/build/mod.rs

//! Build orchestration
//!
//! Takes a concretized [`Dag`](crate::solver::Dag) and installs it
//! leaf-first into per-spec prefixes:
//!
//! - [`Orchestrator`]: scheduling, caching and failure isolation
//! - [`phases`]: configure/build/install command plans per build system
//! - [`flags`]: template variables and build arguments from rule tables
//! - [`tool`]: the [`BuildTool`] seam every command goes through

pub mod flags;
mod orchestrator;
pub mod phases;
mod report;
pub mod tool;

pub use orchestrator::{BuildOptions, Orchestrator, Toolchain};
pub use report::{BuildReport, NodeOutcome, NodeReport};
pub use tool::{BuildTool, Invocation, ProcessTool, ToolOutput};
