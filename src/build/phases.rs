// src/build/phases.rs

//! Phase plans per build system
//!
//! A plan is the ordered list of commands that turns a stage directory into
//! an installed prefix. Fetching comes first when the version has a remote
//! source; otherwise the source is expected in `<stage>/src` already.

use crate::recipe::BuildSystem;
use crate::spec::VersionSource;
use std::path::{Path, PathBuf};

/// Name of the source directory inside a stage
pub const SOURCE_DIR: &str = "src";
/// Name of the out-of-tree build directory inside a stage
pub const BUILD_DIR: &str = "build";
/// Downloaded archive name for URL sources
pub const ARCHIVE_NAME: &str = "source.archive";

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: &'static str,
    pub argv: Vec<String>,
    pub workdir: PathBuf,
}

impl Phase {
    fn new(name: &'static str, workdir: &Path, argv: &[&str]) -> Self {
        Self {
            name,
            argv: argv.iter().map(|s| s.to_string()).collect(),
            workdir: workdir.to_path_buf(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    fn args(mut self, args: &[String]) -> Self {
        self.argv.extend(args.iter().cloned());
        self
    }
}

/// Inputs of a plan
#[derive(Debug, Clone)]
pub struct PlanInput<'a> {
    pub build_system: BuildSystem,
    pub source: &'a VersionSource,
    /// Repository URL for commit/branch/tag sources
    pub git: Option<&'a str>,
    pub stage: &'a Path,
    pub prefix: &'a Path,
    /// Rendered build arguments
    pub args: &'a [String],
    pub make_jobs: usize,
}

/// Commands that fetch the source into `<stage>/src`
pub fn fetch_phases(input: &PlanInput<'_>) -> Vec<Phase> {
    let stage = input.stage;
    let src = SOURCE_DIR;
    match (input.source, input.git) {
        (VersionSource::Commit(commit), Some(git)) => vec![
            Phase::new("fetch", stage, &["git", "clone", "--quiet", git, src]),
            Phase::new(
                "checkout",
                &stage.join(src),
                &["git", "checkout", "--quiet", commit.as_str()],
            ),
        ],
        (VersionSource::Branch(r) | VersionSource::Tag(r), Some(git)) => vec![Phase::new(
            "fetch",
            stage,
            &["git", "clone", "--quiet", "--depth", "1", "--branch", r.as_str(), git, src],
        )],
        (VersionSource::Url(url), _) => vec![
            Phase::new("fetch", stage, &["curl", "-fsSL", "-o", ARCHIVE_NAME, url.as_str()]),
            Phase::new(
                "extract",
                stage,
                &["tar", "-xf", ARCHIVE_NAME, "-C", src, "--strip-components=1"],
            ),
        ],
        _ => Vec::new(),
    }
}

/// Configure, build and install commands for the recipe's build system
pub fn build_phases(input: &PlanInput<'_>) -> Vec<Phase> {
    let src = input.stage.join(SOURCE_DIR);
    let build = input.stage.join(BUILD_DIR);
    let prefix = input.prefix.to_string_lossy();
    let jobs = input.make_jobs.max(1).to_string();

    match input.build_system {
        BuildSystem::Autotools => vec![
            Phase::new("configure", &build, &[])
                .arg(src.join("configure").to_string_lossy())
                .arg(format!("--prefix={}", prefix))
                .args(input.args),
            Phase::new("build", &build, &["make"]).arg(format!("-j{}", jobs)),
            Phase::new("install", &build, &["make", "install"]),
        ],
        BuildSystem::Cmake => vec![
            Phase::new("configure", input.stage, &["cmake", "-S", SOURCE_DIR, "-B", BUILD_DIR])
                .arg(format!("-DCMAKE_INSTALL_PREFIX={}", prefix))
                .args(input.args),
            Phase::new(
                "build",
                input.stage,
                &["cmake", "--build", BUILD_DIR, "--parallel", jobs.as_str()],
            ),
            Phase::new("install", input.stage, &["cmake", "--install", BUILD_DIR]),
        ],
        BuildSystem::Makefile => vec![
            Phase::new("build", &src, &["make"])
                .arg(format!("-j{}", jobs))
                .arg(format!("PREFIX={}", prefix))
                .args(input.args),
            Phase::new("install", &src, &["make", "install"]).arg(format!("PREFIX={}", prefix)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(system: BuildSystem, source: &'a VersionSource, args: &'a [String]) -> PlanInput<'a> {
        PlanInput {
            build_system: system,
            source,
            git: Some("https://github.com/HPCToolkit/hpctoolkit.git"),
            stage: Path::new("/s"),
            prefix: Path::new("/p"),
            args,
            make_jobs: 4,
        }
    }

    #[test]
    fn test_autotools_plan() {
        let args = vec!["--with-boost=/opt/boost".to_string()];
        let plan = build_phases(&input(BuildSystem::Autotools, &VersionSource::None, &args));
        let names: Vec<&str> = plan.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["configure", "build", "install"]);
        assert_eq!(
            plan[0].argv,
            vec!["/s/src/configure", "--prefix=/p", "--with-boost=/opt/boost"]
        );
        assert_eq!(plan[0].workdir, PathBuf::from("/s/build"));
        assert_eq!(plan[1].argv, vec!["make", "-j4"]);
    }

    #[test]
    fn test_cmake_plan() {
        let plan = build_phases(&input(BuildSystem::Cmake, &VersionSource::None, &[]));
        assert_eq!(
            plan[0].argv,
            vec!["cmake", "-S", "src", "-B", "build", "-DCMAKE_INSTALL_PREFIX=/p"]
        );
        assert_eq!(plan[2].argv, vec!["cmake", "--install", "build"]);
    }

    #[test]
    fn test_fetch_plans() {
        let commit = VersionSource::Commit("d9d13c70".to_string());
        let plan = fetch_phases(&input(BuildSystem::Autotools, &commit, &[]));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].argv, vec!["git", "checkout", "--quiet", "d9d13c70"]);
        assert_eq!(plan[1].workdir, PathBuf::from("/s/src"));

        let branch = VersionSource::Branch("master".to_string());
        let plan = fetch_phases(&input(BuildSystem::Autotools, &branch, &[]));
        assert!(plan[0].argv.contains(&"--branch".to_string()));

        assert!(fetch_phases(&input(BuildSystem::Autotools, &VersionSource::None, &[])).is_empty());
    }
}
