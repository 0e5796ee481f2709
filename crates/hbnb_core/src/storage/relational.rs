//! SQLite backend with staged, atomically committed writes.
//!
//! # Responsibility
//! - Map each entity kind to its table and rows to entities.
//! - Stage writes in a session and apply them in one transaction on `save`.
//!
//! # Invariants
//! - The session exists only between `reload` and `close`.
//! - A failed `save` poisons the session; only `rollback`, `close` and
//!   `reload` are accepted until it is cleared.
//! - Reads see committed rows only, never staged writes.
//! - Staged writes are applied parent-first so in-commit references resolve.

use super::error::{StorageError, StorageResult};
use super::{Objects, StorageBackend};
use crate::config::{BackendKind, DbConfig};
use crate::db::migrations::apply_migrations;
use crate::db::open_db;
use crate::model::{Entity, Record};
use crate::registry::EntityKind;
use log::{debug, info, warn};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Row, Transaction};
use serde_json::{Number, Value};
use std::time::Instant;

/// Pending writes of one unit of work.
#[derive(Debug, Default)]
struct Session {
    staged: Vec<Entity>,
    poisoned: bool,
}

#[derive(Debug)]
enum SessionState {
    Uninitialized,
    Open(Session),
    Closed,
}

/// Relational storage engine over one SQLite connection.
pub struct DbStorage {
    conn: Connection,
    state: SessionState,
}

impl DbStorage {
    /// Opens the configured database. The session stays closed until
    /// `reload`.
    pub fn open(config: &DbConfig) -> StorageResult<Self> {
        let conn = open_db(config)?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already configured connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            state: SessionState::Uninitialized,
        }
    }

    /// Underlying connection, for inspection outside the session contract.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of writes waiting for the next `save`.
    pub fn staged_len(&self) -> usize {
        match &self.state {
            SessionState::Open(session) => session.staged.len(),
            SessionState::Uninitialized | SessionState::Closed => 0,
        }
    }
}

fn usable(state: &mut SessionState) -> StorageResult<&mut Session> {
    match state {
        SessionState::Open(session) if session.poisoned => Err(StorageError::SessionNeedsRollback),
        SessionState::Open(session) => Ok(session),
        SessionState::Uninitialized | SessionState::Closed => Err(StorageError::SessionClosed),
    }
}

fn ensure_readable(state: &SessionState) -> StorageResult<()> {
    match state {
        SessionState::Open(session) if session.poisoned => Err(StorageError::SessionNeedsRollback),
        SessionState::Open(_) => Ok(()),
        SessionState::Uninitialized | SessionState::Closed => Err(StorageError::SessionClosed),
    }
}

impl StorageBackend for DbStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open(_))
    }

    fn all(&self, kind: Option<EntityKind>) -> StorageResult<Objects> {
        ensure_readable(&self.state)?;

        let kinds = match kind {
            Some(kind) => vec![kind],
            None => EntityKind::ALL.to_vec(),
        };
        let mut objects = Objects::new();
        for kind in kinds {
            select_all(&self.conn, kind, &mut objects)?;
        }
        Ok(objects)
    }

    fn new(&mut self, obj: &Entity) -> StorageResult<()> {
        let session = usable(&mut self.state)?;
        let key = obj.key();
        match session.staged.iter_mut().find(|staged| staged.key() == key) {
            Some(existing) => *existing = obj.clone(),
            None => session.staged.push(obj.clone()),
        }
        Ok(())
    }

    fn save(&mut self) -> StorageResult<()> {
        let Self { conn, state } = self;
        let session = usable(state)?;
        if session.staged.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        match commit_staged(conn, &session.staged) {
            Ok(()) => {
                debug!(
                    "event=storage_save module=storage backend=db status=ok objects={} duration_ms={}",
                    session.staged.len(),
                    started_at.elapsed().as_millis()
                );
                session.staged.clear();
                Ok(())
            }
            Err(err) => {
                session.poisoned = true;
                warn!(
                    "event=storage_save module=storage backend=db status=error staged={} error_code={} error={}",
                    session.staged.len(),
                    if err.is_constraint_violation() {
                        "constraint_violation"
                    } else {
                        "commit_failed"
                    },
                    err
                );
                Err(err)
            }
        }
    }

    fn rollback(&mut self) -> StorageResult<()> {
        let session = match &mut self.state {
            SessionState::Open(session) => session,
            SessionState::Uninitialized | SessionState::Closed => {
                return Err(StorageError::SessionClosed)
            }
        };
        if !session.poisoned && session.staged.is_empty() {
            return Err(StorageError::NothingToRollback);
        }

        info!(
            "event=storage_rollback module=storage backend=db status=ok discarded={} was_failed={}",
            session.staged.len(),
            session.poisoned
        );
        *session = Session::default();
        Ok(())
    }

    fn delete(&mut self, obj: &Entity) -> StorageResult<()> {
        let Self { conn, state } = self;
        let session = usable(state)?;
        let key = obj.key();

        let tx = conn.transaction()?;
        let removed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", obj.kind().table()),
            [obj.id()],
        )?;
        tx.commit()?;
        session.staged.retain(|staged| staged.key() != key);

        debug!(
            "event=storage_delete module=storage backend=db status={} key={}",
            if removed == 0 { "absent" } else { "ok" },
            key
        );
        Ok(())
    }

    fn delete_all(&mut self) -> StorageResult<()> {
        let Self { conn, state } = self;
        let session = usable(state)?;
        session.staged.clear();

        let tx = conn.transaction()?;
        let mut removed = 0;
        for kind in EntityKind::ALL.iter().rev() {
            removed += tx.execute(&format!("DELETE FROM {};", kind.table()), [])?;
        }
        tx.commit()?;

        info!(
            "event=storage_delete_all module=storage backend=db status=ok rows={}",
            removed
        );
        Ok(())
    }

    fn reload(&mut self) -> StorageResult<()> {
        apply_migrations(&mut self.conn)?;
        if let SessionState::Open(session) = &self.state {
            if !session.staged.is_empty() {
                debug!(
                    "event=storage_reload module=storage backend=db status=discard staged={}",
                    session.staged.len()
                );
            }
        }
        self.state = SessionState::Open(Session::default());
        debug!("event=storage_reload module=storage backend=db status=ok");
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        if let SessionState::Open(session) = &self.state {
            if !session.staged.is_empty() || session.poisoned {
                debug!(
                    "event=storage_close module=storage backend=db status=discard staged={} was_failed={}",
                    session.staged.len(),
                    session.poisoned
                );
            }
        }
        self.state = SessionState::Closed;
        Ok(())
    }
}

fn commit_staged(conn: &mut Connection, staged: &[Entity]) -> StorageResult<()> {
    let mut ordered: Vec<&Entity> = staged.iter().collect();
    ordered.sort_by_key(|obj| obj.kind());

    let tx = conn.transaction()?;
    for obj in ordered {
        upsert(&tx, obj)?;
    }
    tx.commit()?;
    Ok(())
}

fn upsert(tx: &Transaction<'_>, obj: &Entity) -> StorageResult<()> {
    let kind = obj.kind();
    let columns = kind.columns();
    let record = obj.to_record()?;

    let mut stmt = tx.prepare_cached(&upsert_sql(kind.table(), &columns))?;
    let values = columns
        .iter()
        .map(|column| to_sql_value(record.get(*column)));
    stmt.execute(params_from_iter(values))?;
    Ok(())
}

fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = columns
        .iter()
        .filter(|column| **column != "id" && **column != "created_at")
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders}) ON CONFLICT (id) DO UPDATE SET {updates};",
        columns.join(", ")
    )
}

fn select_all(conn: &Connection, kind: EntityKind, objects: &mut Objects) -> StorageResult<()> {
    let columns = kind.columns();
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM {} ORDER BY created_at ASC, id ASC;",
        columns.join(", "),
        kind.table()
    ))?;

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let record = row_to_record(row, &columns)?;
        let obj = kind.build(record)?;
        objects.insert(obj.key(), obj);
    }
    Ok(())
}

fn row_to_record(row: &Row<'_>, columns: &[&str]) -> StorageResult<Record> {
    let mut record = Record::new();
    for (index, column) in columns.iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(value) => Value::from(value),
            ValueRef::Real(value) => Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(
                std::str::from_utf8(bytes)
                    .map_err(|_| {
                        StorageError::InvalidData(format!("non-UTF-8 text in column `{column}`"))
                    })?
                    .to_string(),
            ),
            ValueRef::Blob(_) => {
                return Err(StorageError::InvalidData(format!(
                    "unexpected blob in column `{column}`"
                )))
            }
        };
        record.insert((*column).to_string(), value);
    }
    Ok(record)
}

fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(flag)) => SqlValue::Integer(i64::from(*flag)),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Some(Value::String(text)) => SqlValue::Text(text.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}
