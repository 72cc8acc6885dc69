// src/db/schema.rs

//! Schema versioning for the build record store
//!
//! The version lives in SQLite's `user_version` pragma. Opening a store
//! created by a newer brigade is refused rather than guessed at.

use crate::db::migrations;
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Schema version this build writes
pub const SCHEMA_VERSION: i32 = 2;

/// Version recorded in the database; 0 for a fresh file
pub fn stored_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the store up to [`SCHEMA_VERSION`], one step per transaction
pub fn migrate(conn: &Connection) -> Result<()> {
    let from = stored_version(conn)?;
    debug!("Record store at schema version {}", from);

    if from > SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "record store schema version {} is newer than this build supports ({})",
            from, SCHEMA_VERSION
        )));
    }

    for step in (from + 1)..=SCHEMA_VERSION {
        info!("Upgrading record store to schema version {}", step);
        let tx = conn.unchecked_transaction()?;
        match step {
            1 => migrations::migrate_v1(&tx)?,
            2 => migrations::migrate_v2(&tx)?,
            _ => {
                return Err(Error::Config(format!("no migration to schema version {}", step)));
            }
        }
        tx.pragma_update(None, "user_version", step)?;
        tx.commit()?;
    }
    Ok(())
}
