//! Connection bootstrap for the relational backend.
//!
//! # Invariants
//! - Returned connections have `foreign_keys` set from configuration.
//! - With `drop_on_start`, every entity table is gone and the schema version
//!   is 0 when this returns; `apply_migrations` recreates them.

use super::migrations::drop_schema;
use super::DbResult;
use crate::config::DbConfig;
use log::{error, info};
use rusqlite::Connection;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the database named by `config.database`.
///
/// # Side effects
/// - Drops the schema when `config.drop_on_start` is set.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(config: &DbConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = if config.is_in_memory() { "memory" } else { "file" };
    info!(
        "event=db_open module=db status=start mode={} database={} host={} user={}",
        mode,
        config.database,
        config.host.as_deref().unwrap_or("-"),
        config.user.as_deref().unwrap_or("-")
    );

    let opened = if config.is_in_memory() {
        Connection::open_in_memory()
    } else {
        Connection::open(&config.database)
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = configure_connection(&mut conn, config) {
        error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode={} foreign_keys={} dropped={} duration_ms={}",
        mode,
        config.foreign_keys,
        config.drop_on_start,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn configure_connection(conn: &mut Connection, config: &DbConfig) -> DbResult<()> {
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if config.drop_on_start {
        drop_schema(conn)?;
    }
    Ok(())
}
