//! Relational schema migrations.
//!
//! # Responsibility
//! - Create the per-entity tables in strictly increasing version order.
//! - Drop the whole schema for test/reset startup flows.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - `drop_schema` leaves `user_version = 0` so the next `apply_migrations`
//!   rebuilds every table.

use crate::db::{DbError, DbResult};
use crate::registry::EntityKind;
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the schema up to `latest_version()` inside one transaction.
///
/// Calling this on an up-to-date database is a no-op.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = schema_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!(
        "event=schema_migrate module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

/// Drops every entity table, children first, and resets the schema version.
pub fn drop_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    for kind in EntityKind::ALL.iter().rev() {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", kind.table()))?;
    }
    tx.execute_batch("PRAGMA user_version = 0;")?;
    tx.commit()?;

    info!("event=schema_drop module=db status=ok");
    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
