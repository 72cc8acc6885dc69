// src/db/paths.rs
//! Centralized path derivation for a brigade store root

use crate::hash;
use crate::spec::ConcreteNode;
use std::path::{Path, PathBuf};

/// Directory layout under a store root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record database
    pub fn db_path(&self) -> PathBuf {
        self.root.join("brigade.db")
    }

    /// Parent of every install prefix
    pub fn opt_dir(&self) -> PathBuf {
        self.root.join("opt")
    }

    /// Parent of every build directory
    pub fn stage_dir(&self) -> PathBuf {
        self.root.join("stage")
    }

    /// Process lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    /// Install prefix: `opt/<name>-<version>-<hash7>`
    pub fn prefix_for(&self, node: &ConcreteNode, spec_hash: &str) -> PathBuf {
        self.opt_dir().join(dir_name(node, spec_hash))
    }

    /// Build directory, named like the prefix
    pub fn stage_for(&self, node: &ConcreteNode, spec_hash: &str) -> PathBuf {
        self.stage_dir().join(dir_name(node, spec_hash))
    }
}

fn dir_name(node: &ConcreteNode, spec_hash: &str) -> String {
    format!("{}-{}-{}", node.name, node.version, hash::short(spec_hash))
}

/// Metadata directory inside an install prefix
pub fn metadata_dir(prefix: &Path) -> PathBuf {
    prefix.join(".brigade")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Compiler, VersionSource};
    use crate::version::Version;
    use std::collections::BTreeMap;

    fn node() -> ConcreteNode {
        ConcreteNode {
            name: "zlib".to_string(),
            version: Version::parse("1.2.11").unwrap(),
            source: VersionSource::None,
            variants: BTreeMap::new(),
            compiler: Compiler {
                name: "gcc".to_string(),
                version: Version::parse("9.3.0").unwrap(),
            },
            target: "x86_64".to_string(),
            dependencies: BTreeMap::new(),
            recipe_hash: String::new(),
        }
    }

    #[test]
    fn test_layout() {
        let layout = StoreLayout::new("/srv/brigade");
        assert_eq!(layout.db_path(), PathBuf::from("/srv/brigade/brigade.db"));
        assert_eq!(layout.lock_path(), PathBuf::from("/srv/brigade/.lock"));
        assert_eq!(
            layout.prefix_for(&node(), "abcdef0123456789"),
            PathBuf::from("/srv/brigade/opt/zlib-1.2.11-abcdef0")
        );
        assert_eq!(
            layout.stage_for(&node(), "abcdef0123456789"),
            PathBuf::from("/srv/brigade/stage/zlib-1.2.11-abcdef0")
        );
    }
}
