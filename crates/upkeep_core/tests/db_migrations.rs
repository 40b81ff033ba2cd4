use rusqlite::Connection;
use upkeep_core::db::migrations::latest_version;
use upkeep_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "accounts");
    assert_table_exists(&conn, "assets");
    assert_table_exists(&conn, "asset_service_dates");
    assert_table_exists(&conn, "maintenance_templates");
    assert_table_exists(&conn, "template_asset_classes");
    assert_table_exists(&conn, "maintenance_tasks");
    assert_index_exists(&conn, "uq_tasks_asset_template_period");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upkeep.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "maintenance_tasks");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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

#[test]
fn asset_owner_check_rejects_rows_with_two_owners() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO accounts (id, name) VALUES ('acct', 'Home');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO assets (id, account_id, parent_id, asset_class, name)
         VALUES ('root', 'acct', NULL, 'house', 'House');",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO assets (id, account_id, parent_id, asset_class, name)
         VALUES ('bad', 'acct', 'root', 'hvac', 'Furnace');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
