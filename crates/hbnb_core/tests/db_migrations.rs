use hbnb_core::db::migrations::{apply_migrations, drop_schema, latest_version, schema_version};
use hbnb_core::db::{open_db, DbError};
use hbnb_core::{DbConfig, EntityKind};
use rusqlite::Connection;

#[test]
fn apply_migrations_creates_every_entity_table() {
    let mut conn = open_db(&DbConfig::in_memory()).unwrap();
    apply_migrations(&mut conn).unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for kind in EntityKind::ALL {
        assert_table_exists(&conn, kind.table());
    }
}

#[test]
fn tables_expose_registry_columns_in_order() {
    let mut conn = open_db(&DbConfig::in_memory()).unwrap();
    apply_migrations(&mut conn).unwrap();

    for kind in EntityKind::ALL {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({});", kind.table()))
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>("name"))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns, kind.columns(), "columns of {}", kind.table());
    }
}

#[test]
fn applying_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig {
        database: dir.path().join("hbnb.db").to_str().unwrap().to_string(),
        ..DbConfig::default()
    };

    let mut first = open_db(&config).unwrap();
    apply_migrations(&mut first).unwrap();
    drop(first);

    let mut second = open_db(&config).unwrap();
    apply_migrations(&mut second).unwrap();
    assert_eq!(schema_version(&second).unwrap(), latest_version());
    assert_table_exists(&second, "states");
}

#[test]
fn drop_schema_removes_tables_and_resets_version() {
    let mut conn = open_db(&DbConfig::in_memory()).unwrap();
    apply_migrations(&mut conn).unwrap();

    drop_schema(&mut conn).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);
    assert_table_missing(&conn, "states");
    assert_table_missing(&conn, "reviews");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let config = DbConfig {
        database: path.to_str().unwrap().to_string(),
        ..DbConfig::default()
    };
    let mut conn = open_db(&config).unwrap();
    match apply_migrations(&mut conn).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table_name],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn assert_table_missing(conn: &Connection, table_name: &str) {
    assert!(!table_exists(conn, table_name), "table {table_name} still exists");
}
