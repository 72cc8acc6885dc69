// src/config.rs

//! Configuration file
//!
//! `$XDG_CONFIG_HOME/brigade/config.toml` unless `--config` names another
//! file. Every field has a default, so a missing default file is not an
//! error. Command-line flags override what the file says.
//!
//! ```toml
//! root = "/opt/brigade"
//! recipe_paths = ["/opt/brigade/recipes"]
//! jobs = 4
//! build_timeout = 3600
//! default_compiler = "gcc@9:"
//!
//! [[compilers]]
//! name = "gcc"
//! version = "9.3.0"
//! cc = "/usr/bin/gcc"
//! cxx = "/usr/bin/g++"
//!
//! [solver]
//! max_attempts = 100000
//! max_variant_flips = 2
//! ```

use crate::build::{BuildOptions, Toolchain};
use crate::db::StoreLayout;
use crate::error::{Error, Result};
use crate::solver::SolverOptions;
use crate::spec::{Compiler, CompilerSpec};
use crate::spec::target::{host_target, normalize};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Store root: records, prefixes and stage directories
    pub root: PathBuf,
    /// Recipe directories, searched in order
    pub recipe_paths: Vec<PathBuf>,
    /// Concurrent node builds
    pub jobs: usize,
    /// Parallelism handed to each build system; defaults to `jobs`
    pub make_jobs: Option<usize>,
    /// Per-phase timeout in seconds
    pub build_timeout: Option<u64>,
    pub keep_stage: bool,
    /// Compiler requirement applied when a request names none, e.g. `gcc@9:`
    pub default_compiler: Option<String>,
    /// Target applied when a request names none; defaults to the host
    pub default_target: Option<String>,
    /// Known compilers; detected from `PATH` when empty
    pub compilers: Vec<CompilerEntry>,
    pub solver: SolverConfig,
}

/// One configured compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub cc: Option<PathBuf>,
    #[serde(default)]
    pub cxx: Option<PathBuf>,
}

/// Search limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub max_attempts: usize,
    pub max_variant_flips: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let defaults = SolverOptions::default();
        Self {
            max_attempts: defaults.max_attempts,
            max_variant_flips: defaults.max_variant_flips,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let root = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("brigade");
        let recipe_paths = vec![root.join("recipes")];
        Self {
            root,
            recipe_paths,
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            make_jobs: None,
            build_timeout: None,
            keep_stage: false,
            default_compiler: None,
            default_target: None,
            compilers: Vec::new(),
            solver: SolverConfig::default(),
        }
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("brigade").join("config.toml"))
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist; the default path may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {}", path.display());
        Self::parse(&content).map_err(|e| match e {
            Error::Config(reason) => Error::Config(format!("{}: {}", path.display(), reason)),
            other => other,
        })
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }
        if self.make_jobs == Some(0) {
            return Err(Error::Config("make_jobs must be at least 1".to_string()));
        }
        if self.solver.max_attempts == 0 {
            return Err(Error::Config(
                "solver.max_attempts must be at least 1".to_string(),
            ));
        }
        for entry in &self.compilers {
            entry.compiler()?;
        }
        if let Some(spec) = &self.default_compiler {
            CompilerSpec::parse(spec)?;
        }
        Ok(())
    }

    /// Directory layout under the store root
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.root)
    }

    /// Configured compilers, or the ones found on `PATH`
    pub fn toolchains(&self) -> Result<Vec<Toolchain>> {
        if self.compilers.is_empty() {
            return Ok(detect_toolchains());
        }
        self.compilers
            .iter()
            .map(|entry| {
                Ok(Toolchain {
                    compiler: entry.compiler()?,
                    cc: entry.cc.clone(),
                    cxx: entry.cxx.clone(),
                })
            })
            .collect()
    }

    /// Solver settings derived from this configuration
    pub fn solver_options(&self, toolchains: &[Toolchain]) -> Result<SolverOptions> {
        let default_compiler = self
            .default_compiler
            .as_deref()
            .map(CompilerSpec::parse)
            .transpose()?;
        Ok(SolverOptions {
            max_attempts: self.solver.max_attempts,
            max_variant_flips: self.solver.max_variant_flips,
            compilers: toolchains.iter().map(|t| t.compiler.clone()).collect(),
            default_compiler,
            default_target: self
                .default_target
                .as_deref()
                .map(|t| normalize(t).to_string())
                .unwrap_or_else(host_target),
        })
    }

    /// Orchestrator settings derived from this configuration
    pub fn build_options(&self, toolchains: Vec<Toolchain>) -> BuildOptions {
        BuildOptions {
            jobs: self.jobs,
            make_jobs: self.make_jobs.unwrap_or(self.jobs),
            timeout: self.build_timeout.map(Duration::from_secs),
            force: false,
            keep_stage: self.keep_stage,
            toolchains,
        }
    }
}

impl CompilerEntry {
    /// The concrete compiler this entry describes
    pub fn compiler(&self) -> Result<Compiler> {
        Ok(Compiler {
            name: self.name.clone(),
            version: Version::parse(&self.version).map_err(|e| {
                Error::Config(format!("compiler {}: {}", self.name, e))
            })?,
        })
    }
}

/// Find gcc and clang on `PATH`
fn detect_toolchains() -> Vec<Toolchain> {
    let candidates = [
        ("gcc", "gcc", "g++", "-dumpfullversion"),
        ("clang", "clang", "clang++", "-dumpversion"),
    ];
    let mut found = Vec::new();
    for (name, cc, cxx, flag) in candidates {
        let Ok(output) = Command::new(cc).arg(flag).output() else {
            continue;
        };
        if !output.status.success() {
            continue;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let Ok(version) = Version::parse(&text) else {
            continue;
        };
        debug!("Detected {}@{}", name, version);
        found.push(Toolchain {
            compiler: Compiler {
                name: name.to_string(),
                version,
            },
            cc: Some(PathBuf::from(cc)),
            cxx: Some(PathBuf::from(cxx)),
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.jobs >= 1);
        assert_eq!(config.solver.max_attempts, 100_000);
        assert_eq!(config.solver.max_variant_flips, 2);
        assert!(config.recipe_paths[0].ends_with("recipes"));
    }

    #[test]
    fn test_full_file() {
        let config = Config::parse(
            r#"
root = "/srv/brigade"
recipe_paths = ["/srv/recipes", "/srv/more"]
jobs = 8
make_jobs = 16
build_timeout = 60
default_compiler = "gcc@9:"
default_target = "amd64"

[[compilers]]
name = "gcc"
version = "9.3.0"
cc = "/usr/bin/gcc-9"

[[compilers]]
name = "gcc"
version = "4.8.5"

[solver]
max_variant_flips = 1
"#,
        )
        .unwrap();

        let toolchains = config.toolchains().unwrap();
        assert_eq!(toolchains.len(), 2);
        assert_eq!(toolchains[0].cc, Some(PathBuf::from("/usr/bin/gcc-9")));

        let solver = config.solver_options(&toolchains).unwrap();
        assert_eq!(solver.default_target, "x86_64");
        assert_eq!(solver.max_variant_flips, 1);
        assert_eq!(solver.max_attempts, 100_000);
        assert_eq!(solver.default_compiler.unwrap().to_string(), "%gcc@9:");

        let build = config.build_options(toolchains);
        assert_eq!(build.jobs, 8);
        assert_eq!(build.make_jobs, 16);
        assert_eq!(build.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.layout().db_path(), PathBuf::from("/srv/brigade/brigade.db"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(Config::parse("jobs = 0"), Err(Error::Config(_))));
        assert!(matches!(Config::parse("colour = true"), Err(Error::Config(_))));
        assert!(Config::parse("[[compilers]]\nname = \"gcc\"\nversion = \"\"\n").is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Config(_))));

        let present = dir.path().join("config.toml");
        fs::write(&present, "jobs = 3\n").unwrap();
        assert_eq!(Config::load(Some(&present)).unwrap().jobs, 3);
    }
}
