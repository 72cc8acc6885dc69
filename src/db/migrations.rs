// src/db/migrations.rs
//! Schema steps for the build record store
//!
//! `migrate_vN` takes a store from version N-1 to N. [`super::schema::migrate`]
//! wraps each call in its own transaction.

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

/// Records keyed by canonical hash, plus the typed edges between them
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating build record tables");

    conn.execute_batch(
        "
        CREATE TABLE build_records (
            hash TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            node_json TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'building', 'installed', 'failed')),
            prefix TEXT NOT NULL,
            environment_json TEXT NOT NULL DEFAULT '[]',
            filters_json TEXT NOT NULL DEFAULT '[]',
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX idx_build_records_name ON build_records(name);
        CREATE INDEX idx_build_records_status ON build_records(status);

        CREATE TABLE build_dependencies (
            hash TEXT NOT NULL,
            dependency_hash TEXT NOT NULL,
            dependency_name TEXT NOT NULL,
            types TEXT NOT NULL,
            PRIMARY KEY (hash, dependency_hash),
            FOREIGN KEY (hash) REFERENCES build_records(hash) ON DELETE CASCADE
        );

        CREATE INDEX idx_build_dependencies_dependency ON build_dependencies(dependency_hash);
        ",
    )?;

    Ok(())
}

/// Where each build wrote its log
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Adding log_path to build_records");
    conn.execute_batch("ALTER TABLE build_records ADD COLUMN log_path TEXT;")?;
    Ok(())
}
