// src/db/mod.rs

//! Persistent build record store
//!
//! Records live in a SQLite database under the store root, keyed by
//! canonical spec hash. Writers are serialized through one connection
//! behind a mutex and every status transition is a single transaction, so a
//! crash never leaves a half-written record. A process-level lock file keeps
//! two processes from building into the same root.

pub mod migrations;
mod models;
pub mod paths;
pub mod schema;

pub use models::{BuildRecord, BuildStatus, DependencyLink};
pub use paths::StoreLayout;

use crate::environment::{EnvironmentFilter, EnvironmentModification};
use crate::error::{Error, Result};
use fs2::FileExt;
use rusqlite::{Connection, Transaction};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Handle on the record database
pub struct BuildStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl BuildStore {
    /// Open (creating if needed) and migrate the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        schema::migrate(&conn)?;
        debug!("Opened record store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("record store mutex poisoned")))
    }

    /// Run `f` inside one transaction
    fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Insert a record unless one with the same hash exists
    ///
    /// Returns the stored record either way.
    pub fn insert_if_absent(&self, record: BuildRecord) -> Result<BuildRecord> {
        self.transaction(|tx| {
            if let Some(existing) = BuildRecord::find_by_hash(tx, &record.hash)? {
                return Ok(existing);
            }
            record.insert(tx)?;
            Ok(record)
        })
    }

    /// Record by full hash
    pub fn get(&self, hash: &str) -> Result<Option<BuildRecord>> {
        let conn = self.lock()?;
        BuildRecord::find_by_hash(&conn, hash)
    }

    /// Record whose hash starts with `prefix`; ambiguity is an error
    pub fn find_by_prefix(&self, prefix: &str) -> Result<BuildRecord> {
        let conn = self.lock()?;
        let mut matches = BuildRecord::find_by_hash_prefix(&conn, prefix)?;
        match matches.len() {
            0 => Err(Error::NotFound(format!("no build record matches {}", prefix))),
            1 => Ok(matches.remove(0)),
            n => Err(Error::NotFound(format!(
                "{} build records match {}; use a longer hash",
                n, prefix
            ))),
        }
    }

    /// All records
    pub fn list(&self) -> Result<Vec<BuildRecord>> {
        let conn = self.lock()?;
        BuildRecord::list_all(&conn)
    }

    /// Hashes of installed records depending on `hash`
    pub fn dependents(&self, hash: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        BuildRecord::installed_dependent_hashes(&conn, hash)
    }

    /// Pending or failed → building, clearing any previous error
    pub fn mark_building(&self, hash: &str) -> Result<BuildRecord> {
        self.transition(hash, BuildStatus::Building, |record| {
            record.error = None;
        })
    }

    /// Building → installed, storing the captured environment
    pub fn mark_installed(
        &self,
        hash: &str,
        environment: Vec<EnvironmentModification>,
        filters: Vec<EnvironmentFilter>,
        log_path: Option<PathBuf>,
    ) -> Result<BuildRecord> {
        self.transition(hash, BuildStatus::Installed, move |record| {
            record.environment = environment;
            record.filters = filters;
            record.log_path = log_path;
        })
    }

    /// Any state → failed, storing the reason
    pub fn mark_failed(
        &self,
        hash: &str,
        error: &str,
        log_path: Option<PathBuf>,
    ) -> Result<BuildRecord> {
        let error = error.to_string();
        self.transition(hash, BuildStatus::Failed, move |record| {
            record.error = Some(error);
            record.log_path = log_path;
        })
    }

    fn transition(
        &self,
        hash: &str,
        status: BuildStatus,
        update: impl FnOnce(&mut BuildRecord),
    ) -> Result<BuildRecord> {
        self.transaction(|tx| {
            let mut record = BuildRecord::find_by_hash(tx, hash)?
                .ok_or_else(|| Error::NotFound(format!("build record {}", hash)))?;
            debug!("{} {} -> {}", record.name, record.status, status);
            record.status = status;
            update(&mut record);
            record.update(tx)?;
            Ok(record)
        })
    }

    /// Remove a record
    ///
    /// Refuses while other installed records depend on it unless `force` is set.
    pub fn remove(&self, hash: &str, force: bool) -> Result<BuildRecord> {
        self.transaction(|tx| {
            let record = BuildRecord::find_by_hash(tx, hash)?
                .ok_or_else(|| Error::NotFound(format!("build record {}", hash)))?;
            let dependents = BuildRecord::installed_dependent_hashes(tx, hash)?;
            if !dependents.is_empty() && !force {
                return Err(Error::HasDependents {
                    name: record.name,
                    dependents: dependents
                        .iter()
                        .map(|h| crate::hash::short(h).to_string())
                        .collect(),
                });
            }
            BuildRecord::delete(tx, hash)?;
            info!("Removed build record {} ({})", crate::hash::short(hash), record.name);
            Ok(record)
        })
    }
}

/// Exclusive lock on a store root, held until dropped
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Take the lock without blocking
    pub fn acquire(layout: &StoreLayout) -> Result<Self> {
        fs::create_dir_all(layout.root())?;
        let path = layout.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| Error::StoreLocked(layout.root().to_path_buf()))?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Compiler, ConcreteNode, VersionSource, default_dep_types};
    use crate::version::Version;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn node(name: &str) -> ConcreteNode {
        ConcreteNode {
            name: name.to_string(),
            version: Version::parse("2.0").unwrap(),
            source: VersionSource::None,
            variants: BTreeMap::new(),
            compiler: Compiler {
                name: "gcc".to_string(),
                version: Version::parse("9.3.0").unwrap(),
            },
            target: "x86_64".to_string(),
            dependencies: BTreeMap::new(),
            recipe_hash: "r".to_string(),
        }
    }

    fn store() -> (TempDir, BuildStore) {
        let dir = TempDir::new().unwrap();
        let store = BuildStore::open(&dir.path().join("brigade.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_transitions() {
        let (_dir, store) = store();
        let record = BuildRecord::new("1234abcd".to_string(), node("zlib"), "/p".into(), vec![]);
        store.insert_if_absent(record).unwrap();

        store.mark_building("1234abcd").unwrap();
        let failed = store.mark_failed("1234abcd", "make exited with status 2", None).unwrap();
        assert_eq!(failed.status, BuildStatus::Failed);

        let building = store.mark_building("1234abcd").unwrap();
        assert!(building.error.is_none());

        let env = vec![EnvironmentModification::prepend_path("PATH", "/p/bin")];
        let installed = store.mark_installed("1234abcd", env.clone(), vec![], None).unwrap();
        assert_eq!(installed.status, BuildStatus::Installed);
        assert_eq!(store.get("1234abcd").unwrap().unwrap().environment, env);
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let (_dir, store) = store();
        let record = BuildRecord::new("1234abcd".to_string(), node("zlib"), "/p".into(), vec![]);
        store.insert_if_absent(record.clone()).unwrap();
        store.mark_building("1234abcd").unwrap();

        let again = store.insert_if_absent(record).unwrap();
        assert_eq!(again.status, BuildStatus::Building);
    }

    #[test]
    fn test_find_by_prefix() {
        let (_dir, store) = store();
        for hash in ["abc111", "abc222"] {
            let record = BuildRecord::new(hash.to_string(), node("zlib"), "/p".into(), vec![]);
            store.insert_if_absent(record).unwrap();
        }
        assert_eq!(store.find_by_prefix("abc1").unwrap().hash, "abc111");
        assert!(matches!(store.find_by_prefix("abc"), Err(Error::NotFound(_))));
        assert!(matches!(store.find_by_prefix("fff"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_remove_refuses_with_dependents() {
        let (_dir, store) = store();
        let base = BuildRecord::new("base0001".to_string(), node("zlib"), "/p".into(), vec![]);
        store.insert_if_absent(base).unwrap();
        let link = DependencyLink {
            hash: "base0001".to_string(),
            name: "zlib".to_string(),
            types: default_dep_types(),
        };
        let app = BuildRecord::new("app00001".to_string(), node("app"), "/q".into(), vec![link]);
        store.insert_if_absent(app).unwrap();

        assert!(store.remove("base0001", false).is_err());
        assert!(store.get("base0001").unwrap().is_some());

        store.remove("app00001", false).unwrap();
        store.remove("base0001", false).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_store_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let first = StoreLock::acquire(&layout).unwrap();
        assert!(matches!(
            StoreLock::acquire(&layout),
            Err(Error::StoreLocked(_))
        ));
        drop(first);
        assert!(StoreLock::acquire(&layout).is_ok());
    }
}
