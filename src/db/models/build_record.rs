// src/db/models/build_record.rs

//! Build record model - one row per canonical spec hash

use crate::environment::{EnvironmentFilter, EnvironmentModification};
use crate::error::Result;
use crate::spec::{ConcreteNode, DepType, DepTypes};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum_macros::{AsRefStr, Display, EnumString};

/// Lifecycle state of a build
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Building,
    Installed,
    Failed,
}

/// Edge from a record to one of its dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLink {
    pub hash: String,
    pub name: String,
    pub types: DepTypes,
}

impl DependencyLink {
    /// Whether the dependency is needed at runtime
    pub fn is_runtime(&self) -> bool {
        self.types.contains(&DepType::Link) || self.types.contains(&DepType::Run)
    }

    fn types_column(&self) -> String {
        self.types
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Persistent record of one concrete build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Canonical spec hash
    pub hash: String,
    pub name: String,
    pub version: String,
    pub node: ConcreteNode,
    pub status: BuildStatus,
    pub prefix: PathBuf,
    /// Modifications captured at install time
    pub environment: Vec<EnvironmentModification>,
    /// Filters whose `when` held at capture time
    pub filters: Vec<EnvironmentFilter>,
    pub dependencies: Vec<DependencyLink>,
    pub error: Option<String>,
    pub log_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "hash, name, version, node_json, status, prefix, environment_json, \
                       filters_json, error, log_path, created_at, updated_at";

impl BuildRecord {
    /// Create a new pending record
    pub fn new(
        hash: String,
        node: ConcreteNode,
        prefix: PathBuf,
        dependencies: Vec<DependencyLink>,
    ) -> Self {
        let now = Utc::now();
        Self {
            hash,
            name: node.name.clone(),
            version: node.version.to_string(),
            node,
            status: BuildStatus::Pending,
            prefix,
            environment: Vec::new(),
            filters: Vec::new(),
            dependencies,
            error: None,
            log_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Insert this record and its dependency edges
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO build_records ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                &self.hash,
                &self.name,
                &self.version,
                serde_json::to_string(&self.node)?,
                self.status.as_ref(),
                self.prefix.to_string_lossy(),
                serde_json::to_string(&self.environment)?,
                serde_json::to_string(&self.filters)?,
                &self.error,
                self.log_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                self.created_at.to_rfc3339(),
                self.updated_at.to_rfc3339(),
            ],
        )?;

        for dep in &self.dependencies {
            conn.execute(
                "INSERT INTO build_dependencies (hash, dependency_hash, dependency_name, types)
                 VALUES (?1, ?2, ?3, ?4)",
                params![&self.hash, &dep.hash, &dep.name, dep.types_column()],
            )?;
        }
        Ok(())
    }

    /// Write the mutable columns back
    pub fn update(&mut self, conn: &Connection) -> Result<()> {
        self.updated_at = Utc::now();
        conn.execute(
            "UPDATE build_records
             SET status = ?1, environment_json = ?2, filters_json = ?3, error = ?4,
                 log_path = ?5, updated_at = ?6
             WHERE hash = ?7",
            params![
                self.status.as_ref(),
                serde_json::to_string(&self.environment)?,
                serde_json::to_string(&self.filters)?,
                &self.error,
                self.log_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                self.updated_at.to_rfc3339(),
                &self.hash,
            ],
        )?;
        Ok(())
    }

    /// Find a record by full hash
    pub fn find_by_hash(conn: &Connection, hash: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM build_records WHERE hash = ?1"
        ))?;
        let record = stmt.query_row([hash], Self::from_row).optional()?;
        record.map(|r| r.with_dependencies(conn)).transpose()
    }

    /// Records whose hash starts with `prefix`
    pub fn find_by_hash_prefix(conn: &Connection, prefix: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM build_records WHERE substr(hash, 1, ?2) = ?1 ORDER BY hash"
        ))?;
        let records = stmt
            .query_map(params![prefix, prefix.len() as i64], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.into_iter().map(|r| r.with_dependencies(conn)).collect()
    }

    /// List all records, by name then version
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM build_records ORDER BY name, version, hash"
        ))?;
        let records = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.into_iter().map(|r| r.with_dependencies(conn)).collect()
    }

    /// Hashes of installed records that depend on `hash`
    ///
    /// Pending and failed dependents never used the dependency, so they do
    /// not count.
    pub fn installed_dependent_hashes(conn: &Connection, hash: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT d.hash FROM build_dependencies d
             JOIN build_records r ON r.hash = d.hash
             WHERE d.dependency_hash = ?1 AND r.status = 'installed'
             ORDER BY d.hash",
        )?;
        let hashes = stmt
            .query_map([hash], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(hashes)
    }

    /// Delete a record and its outgoing edges
    pub fn delete(conn: &Connection, hash: &str) -> Result<bool> {
        conn.execute("DELETE FROM build_dependencies WHERE hash = ?1", [hash])?;
        let removed = conn.execute("DELETE FROM build_records WHERE hash = ?1", [hash])?;
        Ok(removed > 0)
    }

    fn with_dependencies(mut self, conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT dependency_hash, dependency_name, types FROM build_dependencies
             WHERE hash = ?1 ORDER BY dependency_name",
        )?;
        self.dependencies = stmt
            .query_map([&self.hash], |row| {
                let types: String = row.get(2)?;
                let types = crate::spec::parse_dep_types(&types)
                    .map_err(|e| conversion_error(2, e))?;
                Ok(DependencyLink {
                    hash: row.get(0)?,
                    name: row.get(1)?,
                    types,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Convert a database row to a BuildRecord (dependencies filled separately)
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let node_json: String = row.get(3)?;
        let status: String = row.get(4)?;
        let prefix: String = row.get(5)?;
        let environment_json: String = row.get(6)?;
        let filters_json: String = row.get(7)?;
        let log_path: Option<String> = row.get(9)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;

        Ok(Self {
            hash: row.get(0)?,
            name: row.get(1)?,
            version: row.get(2)?,
            node: serde_json::from_str(&node_json).map_err(|e| conversion_error(3, e))?,
            status: status.parse().map_err(|e| conversion_error(4, e))?,
            prefix: PathBuf::from(prefix),
            environment: serde_json::from_str(&environment_json)
                .map_err(|e| conversion_error(6, e))?,
            filters: serde_json::from_str(&filters_json).map_err(|e| conversion_error(7, e))?,
            dependencies: Vec::new(),
            error: row.get(8)?,
            log_path: log_path.map(PathBuf::from),
            created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(10, e))?,
            updated_at: parse_timestamp(&updated_at).map_err(|e| conversion_error(11, e))?,
        })
    }
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
