// tests/common/mod.rs

//! Shared fixtures for integration tests: an hpctoolkit-style recipe set,
//! scratch stores and a scripted build tool.

#![allow(dead_code)]

use brigade::build::{BuildTool, Invocation, ToolOutput};
use brigade::db::StoreLayout;
use brigade::spec::Compiler;
use brigade::{BuildOptions, BuildStore, Dag, MemoryRepository, Result, Solver, SolverOptions, Spec, Version};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const HPCTOOLKIT: &str = r#"
[package]
name = "hpctoolkit"
description = "Integrated suite of tools for measurement and analysis of program performance"
homepage = "http://hpctoolkit.org"
git = "https://github.com/HPCToolkit/hpctoolkit"
build_system = "autotools"

[[versions]]
version = "2020.08.03"
commit = "d9d13c705d81e5de38e624254cf0875cce6add9a"

[[versions]]
version = "2019.12.28"
commit = "b0dbc9f3e1b06b5e0c2b1ed67c45a5c6d2b07d10"

[[versions]]
version = "master"
branch = "master"

[[variants]]
name = "mpi"
default = false
description = "Build hpcprof-mpi, the MPI version of hpcprof"

[[variants]]
name = "cuda"
default = false
description = "Support CUDA on NVIDIA GPUs"

[[depends]]
spec = "binutils@:2.34 +libiberty ~nls"
type = "link"

[[depends]]
spec = "boost@1.70.0:"

[[depends]]
spec = "libunwind@1.4:"

[[depends]]
spec = "zlib"

[[depends]]
spec = "mpi"
when = "+mpi"

[[depends]]
spec = "cuda"
when = "+cuda"

[[conflicts]]
spec = "+cuda"
when = "@:2019.99.99"
msg = "cuda requires 2020.03.01 or later"

[[args]]
values = [
    "--with-binutils=%(binutils.prefix)s",
    "--with-boost=%(boost.prefix)s",
    "--with-libunwind=%(libunwind.prefix)s",
    "--with-zlib=%(zlib.prefix)s",
]

[[args]]
when = "+mpi"
values = ["--enable-mpi-search=%(mpi.name)s", "MPICXX=%(mpi.mpicxx)s"]

[[args]]
when = "+cuda"
values = ["--with-cuda=%(cuda.prefix)s"]

[[environment]]
action = "set"
name = "HPCTOOLKIT"
value = "%(prefix)s"

[[environment_filter]]
kinds = ["set"]
name_contains = ["ROCM", "HIP", "CUDA"]
"#;

pub const BINUTILS: &str = r#"
[package]
name = "binutils"
description = "GNU binary utilities"
build_system = "autotools"

[[versions]]
version = "2.35"
url = "https://ftpmirror.gnu.org/binutils/binutils-2.35.tar.bz2"

[[versions]]
version = "2.34"
url = "https://ftpmirror.gnu.org/binutils/binutils-2.34.tar.bz2"

[[versions]]
version = "2.33.1"
url = "https://ftpmirror.gnu.org/binutils/binutils-2.33.1.tar.bz2"

[[variants]]
name = "libiberty"
default = false
description = "Also install libiberty"

[[variants]]
name = "nls"
default = true
description = "Enable Native Language Support"

[[args]]
when = "+libiberty"
values = ["--enable-install-libiberty"]

[[args]]
unless = "+nls"
values = ["--disable-nls"]
"#;

pub const BOOST: &str = r#"
[package]
name = "boost"
build_system = "makefile"

[[versions]]
version = "1.73.0"

[[versions]]
version = "1.70.0"

[[versions]]
version = "1.66.0"
"#;

pub const LIBUNWIND: &str = r#"
[package]
name = "libunwind"
build_system = "autotools"

[[versions]]
version = "1.4.0"

[[versions]]
version = "1.3.1"

[[depends]]
spec = "zlib"
"#;

pub const ZLIB: &str = r#"
[package]
name = "zlib"
build_system = "cmake"

[[versions]]
version = "1.2.11"
"#;

pub const OPENMPI: &str = r#"
[package]
name = "openmpi"
provides = ["mpi"]
build_system = "autotools"

[[versions]]
version = "4.0.5"

[[versions]]
version = "3.1.6"

[attributes]
mpicxx = "%(prefix)s/bin/mpicxx"

[[environment]]
action = "set"
name = "MPI_ROOT"
value = "%(prefix)s"
"#;

pub const MPICH: &str = r#"
[package]
name = "mpich"
provides = ["mpi"]
build_system = "autotools"

[[versions]]
version = "3.3.2"

[attributes]
mpicxx = "%(prefix)s/bin/mpicxx"
"#;

pub const CUDA: &str = r#"
[package]
name = "cuda"
build_system = "makefile"

[[versions]]
version = "11.0.2"

[[versions]]
version = "10.2.89"

[[environment]]
action = "set"
name = "CUDA_HOME"
value = "%(prefix)s"

[[environment]]
action = "prepend_path"
name = "LD_LIBRARY_PATH"
value = "%(prefix)s/lib64"
"#;

/// Every fixture recipe
pub fn hpctoolkit_repository() -> MemoryRepository {
    MemoryRepository::from_toml([HPCTOOLKIT, BINUTILS, BOOST, LIBUNWIND, ZLIB, OPENMPI, MPICH, CUDA])
        .unwrap()
}

/// Two gcc releases on x86_64
pub fn solver_options() -> SolverOptions {
    SolverOptions {
        compilers: vec![
            Compiler {
                name: "gcc".to_string(),
                version: Version::parse("9.3.0").unwrap(),
            },
            Compiler {
                name: "gcc".to_string(),
                version: Version::parse("4.8.5").unwrap(),
            },
        ],
        default_target: "x86_64".to_string(),
        ..Default::default()
    }
}

pub fn resolve(repo: &MemoryRepository, request: &str) -> Result<Dag> {
    Solver::new(repo, solver_options()).resolve(&Spec::parse(request)?)
}

/// A store in a temporary directory; keep the `TempDir` alive
pub fn scratch_store() -> (TempDir, StoreLayout, BuildStore) {
    let dir = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(dir.path().join("store"));
    fs::create_dir_all(layout.root()).unwrap();
    let store = BuildStore::open(&layout.db_path()).unwrap();
    (dir, layout, store)
}

pub fn build_options(jobs: usize) -> BuildOptions {
    BuildOptions {
        jobs,
        make_jobs: 2,
        ..Default::default()
    }
}

/// One recorded invocation and the package it belonged to
#[derive(Debug, Clone)]
pub struct Call {
    pub package: String,
    pub invocation: Invocation,
}

/// Build tool that records what it is asked to run
///
/// Packages are recognized from the stage directory in the working
/// directory. `make install` style invocations create `<prefix>/bin` so
/// prefix inspection has something to find.
#[derive(Default)]
pub struct ScriptedTool {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<BTreeSet<String>>,
    hanging: Mutex<BTreeSet<String>>,
    panicking: Mutex<BTreeSet<String>>,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation for `package` exit non-zero
    pub fn fail(&self, package: &str) {
        self.failing.lock().unwrap().insert(package.to_string());
    }

    /// Make every invocation for `package` report a timeout
    pub fn hang(&self, package: &str) {
        self.hanging.lock().unwrap().insert(package.to_string());
    }

    /// Make the first invocation for `package` panic
    pub fn panic_on(&self, package: &str) {
        self.panicking.lock().unwrap().insert(package.to_string());
    }

    /// Stop failing anything
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.hanging.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, package: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.package == package)
            .map(|c| c.invocation)
            .collect()
    }

    /// Packages in the order their first command ran
    pub fn packages(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for call in self.calls() {
            if !seen.contains(&call.package) {
                seen.push(call.package);
            }
        }
        seen
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// `<root>/stage/<name>-<version>-<hash7>[/...]` → (`<name>`, `<root>/opt/<dir>`)
fn stage_entry(workdir: &Path) -> Option<(String, PathBuf)> {
    let components: Vec<Component> = workdir.components().collect();
    let at = components
        .iter()
        .rposition(|c| c.as_os_str() == "stage")?;
    let dir = components.get(at + 1)?.as_os_str().to_string_lossy().into_owned();
    let root: PathBuf = components[..at].iter().collect();
    let mut parts: Vec<&str> = dir.rsplitn(3, '-').collect();
    parts.reverse();
    let name = parts.first()?.to_string();
    Some((name, root.join("opt").join(&dir)))
}

impl BuildTool for ScriptedTool {
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let Some((package, prefix)) = stage_entry(&invocation.workdir) else {
            panic!("unexpected working directory {}", invocation.workdir.display());
        };
        self.calls.lock().unwrap().push(Call {
            package: package.clone(),
            invocation: invocation.clone(),
        });

        let panics = self.panicking.lock().unwrap().remove(&package);
        if panics {
            panic!("scripted tool blew up on {}", package);
        }
        if self.hanging.lock().unwrap().contains(&package) {
            return Ok(ToolOutput {
                exit_code: None,
                output: "still compiling...\n".to_string(),
                timed_out: true,
            });
        }
        if self.failing.lock().unwrap().contains(&package) {
            return Ok(ToolOutput {
                exit_code: Some(2),
                output: format!("checking for {}... no\nerror: {} does not build\n", package, package),
                timed_out: false,
            });
        }

        if invocation.argv.iter().any(|a| a == "install" || a == "--install") {
            fs::create_dir_all(prefix.join("bin")).unwrap();
        }
        Ok(ToolOutput {
            exit_code: Some(0),
            output: format!("{}\n", invocation.command_line()),
            timed_out: false,
        })
    }
}
