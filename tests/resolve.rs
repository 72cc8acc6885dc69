// tests/resolve.rs

//! Concretization against an hpctoolkit-style recipe set

mod common;

use brigade::recipe::parse_recipe;
use brigade::spec::VersionSource;
use brigade::{Conflict, DirectoryRepository, Error, MemoryRepository, RecipeRepository, Solver, Spec, Unsatisfiable};
use common::{hpctoolkit_repository, resolve, solver_options};
use std::fs;

fn unsatisfiable(result: brigade::Result<brigade::Dag>) -> Unsatisfiable {
    match result {
        Err(Error::Unsatisfiable(u)) => *u,
        other => panic!("expected unsatisfiable, got {:?}", other.map(|d| d.render_tree())),
    }
}

#[test]
fn test_default_resolution() {
    let repo = hpctoolkit_repository();
    let dag = resolve(&repo, "hpctoolkit").unwrap();

    let root = dag.root_node();
    assert_eq!(root.version.as_str(), "2020.08.03");
    assert!(matches!(root.source, VersionSource::Commit(_)));
    assert!(!root.variant_enabled("mpi"));
    assert!(!root.variant_enabled("cuda"));

    let binutils = dag.node("binutils").unwrap();
    assert_eq!(binutils.version.as_str(), "2.34");
    assert!(binutils.variant_enabled("libiberty"));
    assert!(!binutils.variant_enabled("nls"));

    assert_eq!(dag.node("boost").unwrap().version.as_str(), "1.73.0");
    assert_eq!(dag.node("libunwind").unwrap().version.as_str(), "1.4.0");
    assert!(dag.contains("zlib"));
    assert!(!dag.contains("cuda"));
    assert!(dag.virtuals().is_empty());

    for node in dag.nodes() {
        assert_eq!(node.compiler.to_string(), "gcc@9.3.0");
        assert_eq!(node.target, "x86_64");
        // Variant maps are total
        let recipe = repo.load_recipe(&node.name).unwrap();
        for decl in &recipe.variants {
            assert!(node.variants.contains_key(&decl.name), "{} lacks {}", node.name, decl.name);
        }
    }
}

#[test]
fn test_resolution_is_deterministic() {
    let repo = hpctoolkit_repository();
    let first = resolve(&repo, "hpctoolkit +mpi ^binutils@:2.34").unwrap();
    let second = resolve(&repo, "hpctoolkit +mpi ^binutils@:2.34").unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.root_hash(), second.root_hash());

    let other = resolve(&repo, "hpctoolkit").unwrap();
    assert_ne!(first.root_hash(), other.root_hash());
    // Shared leaves keep their hash across requests
    assert_eq!(first.hash("zlib"), other.hash("zlib"));
}

#[test]
fn test_shared_dependency_is_one_node() {
    let repo = hpctoolkit_repository();
    let dag = resolve(&repo, "hpctoolkit").unwrap();
    let mut dependents = dag.dependents("zlib");
    dependents.sort();
    assert_eq!(dependents, vec!["hpctoolkit".to_string(), "libunwind".to_string()]);
    assert_eq!(dag.nodes().filter(|n| n.name == "zlib").count(), 1);
}

#[test]
fn test_user_constraint_reaches_dependency() {
    let repo = hpctoolkit_repository();
    let dag = resolve(&repo, "hpctoolkit ^binutils@:2.33.1").unwrap();
    assert_eq!(dag.node("binutils").unwrap().version.as_str(), "2.33.1");
}

#[test]
fn test_user_constraint_against_recipe() {
    let repo = hpctoolkit_repository();
    let err = unsatisfiable(resolve(&repo, "hpctoolkit ^binutils@2.35"));
    assert_eq!(err.conflict.package(), Some("binutils"));
    assert!(err.to_string().contains("binutils"));
}

#[test]
fn test_cuda_requires_newer_release() {
    let repo = hpctoolkit_repository();

    let dag = resolve(&repo, "hpctoolkit@2019.12.28:2020.12 +cuda").unwrap();
    assert_eq!(dag.root_node().version.as_str(), "2020.08.03");
    assert_eq!(dag.node("cuda").unwrap().version.as_str(), "11.0.2");

    let err = unsatisfiable(resolve(&repo, "hpctoolkit@2019.12.28 +cuda"));
    assert!(matches!(err.conflict, Conflict::ConflictRule { .. }));
    assert!(err.to_string().contains("cuda requires 2020.03.01 or later"));
}

#[test]
fn test_declared_order_beats_branch_versions() {
    let repo = hpctoolkit_repository();
    // `master` sorts above every release but is declared last
    let dag = resolve(&repo, "hpctoolkit@2020:").unwrap();
    assert_eq!(dag.root_node().version.as_str(), "2020.08.03");

    let dag = resolve(&repo, "hpctoolkit@master").unwrap();
    assert_eq!(dag.root_node().source, VersionSource::Branch("master".to_string()));
}

#[test]
fn test_virtual_binds_one_provider() {
    let repo = hpctoolkit_repository();
    let dag = resolve(&repo, "hpctoolkit +mpi").unwrap();
    let provider = dag.virtuals().get("mpi").unwrap().clone();
    assert!(provider == "mpich" || provider == "openmpi");
    let bound = ["mpich", "openmpi"].iter().filter(|p| dag.contains(p)).count();
    assert_eq!(bound, 1);
    assert!(dag.node("hpctoolkit").unwrap().dependencies.contains_key(&provider));

    let dag = resolve(&repo, "hpctoolkit +mpi ^openmpi@3").unwrap();
    assert_eq!(dag.virtuals()["mpi"], "openmpi");
    assert_eq!(dag.node("openmpi").unwrap().version.as_str(), "3.1.6");
}

#[test]
fn test_compiler_and_target_requests() {
    let repo = hpctoolkit_repository();
    let dag = resolve(&repo, "hpctoolkit %gcc@:5").unwrap();
    for node in dag.nodes() {
        assert_eq!(node.compiler.to_string(), "gcc@4.8.5", "{}", node.name);
    }

    let err = unsatisfiable(resolve(&repo, "hpctoolkit %clang"));
    assert!(matches!(err.conflict, Conflict::NoCompiler { .. }));
}

#[test]
fn test_unknown_package() {
    let repo = hpctoolkit_repository();
    assert!(matches!(resolve(&repo, "nosuch"), Err(Error::RecipeNotFound(_))));
}

const APP: &str = r#"
[package]
name = "app"

[[versions]]
version = "1.0"

[[depends]]
spec = "left"

[[depends]]
spec = "right"
"#;

const LEFT: &str = r#"
[package]
name = "left"

[[versions]]
version = "1.0"

[[depends]]
spec = "c@:2.34"
"#;

const RIGHT: &str = r#"
[package]
name = "right"

[[versions]]
version = "1.0"

[[depends]]
spec = "c@:2.33.1"
"#;

const C: &str = r#"
[package]
name = "c"

[[versions]]
version = "2.35"

[[versions]]
version = "2.34"

[[versions]]
version = "2.33.1.2"

[[versions]]
version = "2.32"
"#;

#[test]
fn test_siblings_unify_on_one_version() {
    let repo = MemoryRepository::from_toml([APP, LEFT, RIGHT, C]).unwrap();
    let dag = resolve(&repo, "app").unwrap();
    // `:2.33.1` admits 2.33.1.2
    assert_eq!(dag.node("c").unwrap().version.as_str(), "2.33.1.2");
    assert_eq!(dag.dependents("c").len(), 2);
}

#[test]
fn test_siblings_without_common_version() {
    let right = RIGHT.replace("c@:2.33.1", "c@2.35:");
    let repo = MemoryRepository::from_toml([APP, LEFT, right.as_str(), C]).unwrap();
    let err = unsatisfiable(resolve(&repo, "app"));
    assert_eq!(err.conflict.package(), Some("c"));
    assert!(!err.chain.is_empty());
}

#[test]
fn test_cycle_through_variant_is_rejected() {
    let x = r#"
[package]
name = "x"

[[versions]]
version = "1.0"

[[variants]]
name = "loop"
default = false

[[depends]]
spec = "y"
when = "+loop"
"#;
    let y = r#"
[package]
name = "y"

[[versions]]
version = "1.0"

[[depends]]
spec = "x"
"#;
    let repo = MemoryRepository::from_toml([x, y]).unwrap();
    assert!(resolve(&repo, "x").is_ok());

    let err = unsatisfiable(resolve(&repo, "x +loop"));
    match err.conflict {
        Conflict::CircularDependency { cycle } => {
            assert!(cycle.contains(&"x".to_string()));
            assert!(cycle.contains(&"y".to_string()));
        }
        other => panic!("expected a cycle, got {}", other),
    }
}

const NESTED_R: &str = r#"
[package]
name = "r"

[[versions]]
version = "1.0"

[[depends]]
spec = "c"

[[depends]]
spec = "a"
"#;

const NESTED_A: &str = r#"
[package]
name = "a"

[[versions]]
version = "1.0"

[[depends]]
spec = "b ^c@2.0"
"#;

const NESTED_B: &str = r#"
[package]
name = "b"

[[versions]]
version = "1.0"

[[depends]]
spec = "c"
"#;

const NESTED_C: &str = r#"
[package]
name = "c"

[[versions]]
version = "1.0"

[[versions]]
version = "2.0"
"#;

#[test]
fn test_nested_constraint_reaches_bound_node() {
    let repo = MemoryRepository::from_toml([NESTED_R, NESTED_A, NESTED_B, NESTED_C]).unwrap();
    let dag = resolve(&repo, "r").unwrap();
    // c is bound at 1.0 before a is reached; a's `^c@2.0` forces a backtrack
    assert_eq!(dag.node("c").unwrap().version.as_str(), "2.0");
    assert_eq!(dag.dependents("c").len(), 2);

    let err = unsatisfiable(resolve(&repo, "r ^c@1.0"));
    assert_eq!(err.conflict.package(), Some("c"));
    assert!(err.chain.iter().any(|line| line.contains("a@1.0 depends on b ^c@2.0")));
}

#[test]
fn test_nested_constraint_on_absent_package_fails() {
    let b = NESTED_B.replace("spec = \"c\"", "spec = \"zlib\"");
    let zlib = "[package]\nname = \"zlib\"\n\n[[versions]]\nversion = \"1.2.11\"\n";
    let repo = MemoryRepository::from_toml([NESTED_A, b.as_str(), NESTED_C, zlib]).unwrap();

    // Nothing below a depends on c, so its `^c@2.0` cannot hold
    let err = unsatisfiable(resolve(&repo, "a"));
    match &err.conflict {
        Conflict::UnusedConstraint { package } => assert_eq!(package, "c"),
        other => panic!("expected an unused constraint, got {}", other),
    }
    assert!(err.chain.iter().any(|line| line.contains("b ^c@2.0")));
}

#[test]
fn test_conflict_on_undeclared_variant_is_malformed() {
    let bad = HPCTOOLKIT_WITH_BAD_CONFLICT;
    let mut repo = MemoryRepository::new();
    assert!(matches!(repo.insert_toml(bad), Err(Error::RecipeMalformed { .. })));
    assert!(parse_recipe(bad).is_ok());
}

const HPCTOOLKIT_WITH_BAD_CONFLICT: &str = r#"
[package]
name = "hpctoolkit"

[[versions]]
version = "2020.08.03"

[[conflicts]]
spec = "+rocm"
when = "@:2020.99"
"#;

#[test]
fn test_directory_repository() {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in [
        ("hpctoolkit", common::HPCTOOLKIT),
        ("binutils", common::BINUTILS),
        ("boost", common::BOOST),
        ("libunwind", common::LIBUNWIND),
        ("zlib", common::ZLIB),
    ] {
        fs::write(dir.path().join(format!("{}.toml", name)), content).unwrap();
    }
    fs::create_dir_all(dir.path().join("openmpi")).unwrap();
    fs::write(dir.path().join("openmpi").join("recipe.toml"), common::OPENMPI).unwrap();

    let repo = DirectoryRepository::new(vec![dir.path().to_path_buf()]);
    assert_eq!(repo.providers("mpi").unwrap(), vec!["openmpi".to_string()]);
    assert!(repo.is_virtual("mpi").unwrap());

    let dag = Solver::new(&repo, solver_options())
        .resolve(&Spec::parse("hpctoolkit +mpi").unwrap())
        .unwrap();
    assert_eq!(dag.virtuals()["mpi"], "openmpi");

    let err = Solver::new(&repo, solver_options())
        .resolve(&Spec::parse("hpctoolkit +cuda").unwrap())
        .unwrap_err();
    assert!(err.is_resolution_error());
}
