// src/cli/mod.rs
//! CLI definitions for brigade
//!
//! Definitions only; the handlers live in the `commands` module.
//!
//! - `install` - Concretize a request and build it
//! - `resolve` - Concretize and print the DAG without building
//! - `uninstall` - Remove an installed spec by hash
//! - `list` - List build records
//! - `env` - Print the runtime environment of an installed spec
//! - `info` - Show what a recipe declares

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brigade")]
#[command(author = "Brigade Contributors")]
#[command(version, disable_version_flag = true)]
#[command(about = "Source-based package builder with dependency concretization", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file [default: $XDG_CONFIG_HOME/brigade/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store root holding records and install prefixes
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Recipe directory; may be repeated, searched before configured paths
    #[arg(long = "recipes", global = true, value_name = "DIR")]
    pub recipes: Vec<PathBuf>,

    /// Number of packages built concurrently
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Per-phase build timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra variant constraint such as `+cuda` or `binutils~nls`
    #[arg(short = 'V', long = "variant", global = true, value_name = "SPEC")]
    pub variants: Vec<String>,

    /// Target the root is built for, e.g. `x86_64`
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// Compiler requirement for the root, e.g. `gcc@9:`
    #[arg(long, global = true)]
    pub compiler: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Concretize a spec and build it with its dependencies
    Install {
        /// Spec, e.g. `hpctoolkit@2020.08.03 +cuda ^binutils@:2.34`
        #[arg(required = true, num_args = 1..)]
        spec: Vec<String>,

        /// Rebuild installs whose prefix has gone missing
        #[arg(long)]
        force: bool,

        /// Keep stage directories after successful builds
        #[arg(long)]
        keep_stage: bool,
    },

    /// Concretize a spec and print the resulting DAG
    Resolve {
        /// Spec to concretize
        #[arg(required = true, num_args = 1..)]
        spec: Vec<String>,

        /// Print the DAG as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove an installed spec
    Uninstall {
        /// Hash or unique hash prefix
        hash: String,

        /// Remove even if other installed specs depend on it
        #[arg(short, long)]
        force: bool,
    },

    /// List build records
    List {
        /// Only records for this package
        package: Option<String>,
    },

    /// Print shell commands that set up an installed spec's environment
    Env {
        /// Hash or unique hash prefix
        hash: String,
    },

    /// Show a recipe's versions, variants, dependencies and conflicts
    Info {
        /// Package or virtual name
        package: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
