//! Tests for the SQLite connection and prepared statements

use super::*;

async fn memory_with_table() -> SqliteConnection {
    let conn = SqliteConnection::open(":memory:").expect("Failed to open in-memory db");
    conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, qty INTEGER)")
        .await
        .expect("Failed to create table");
    conn
}

#[tokio::test]
async fn test_execute_and_query_roundtrip() {
    let conn = memory_with_table().await;

    let result = conn
        .execute(
            "INSERT INTO items (name, qty) VALUES (?, ?), (?, ?)",
            &[Value::from("bolt"), Value::from(4), Value::from("nut"), Value::Null],
        )
        .await
        .expect("Failed to insert");
    assert_eq!(result.affected_rows, 2);
    assert_eq!(result.last_insert_id, Some(2));

    let rows = conn
        .query("SELECT name, qty FROM items ORDER BY id", &[])
        .await
        .expect("Failed to query");
    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.rows[0].get_by_name("name"), Some(&Value::String("bolt".into())));
    assert_eq!(rows.rows[0].get_by_name("qty"), Some(&Value::Int64(4)));
    assert_eq!(rows.rows[1].get(1), Some(&Value::Null));
    assert_eq!(rows.columns[1].data_type, "INTEGER");
}

#[tokio::test]
async fn test_prepared_statement_reused_across_executes() {
    let conn = memory_with_table().await;
    let stmt = conn
        .prepare("INSERT INTO items (name, qty) VALUES (?, ?)")
        .await
        .expect("Failed to prepare");

    for i in 0..3 {
        stmt.execute(&[Value::from(format!("item-{i}")), Value::from(i)])
            .await
            .expect("Failed to execute prepared statement");
    }

    let count = conn
        .query("SELECT COUNT(*) FROM items", &[])
        .await
        .expect("Failed to count");
    assert_eq!(count.rows[0].get(0).and_then(Value::as_i64), Some(3));
}

#[tokio::test]
async fn test_prepare_rejects_invalid_sql() {
    let conn = memory_with_table().await;
    let err = conn
        .prepare("INSERT INTO missing_table (a) VALUES (?)")
        .await
        .err()
        .expect("prepare should fail");
    assert!(matches!(err, FastSqlError::Query(_)));
}

#[tokio::test]
async fn test_closed_statement_cannot_execute() {
    let conn = memory_with_table().await;
    let stmt = conn
        .prepare("INSERT INTO items (name) VALUES (?)")
        .await
        .expect("Failed to prepare");

    stmt.close().await.expect("close should succeed");
    stmt.close().await.expect("second close is a no-op");
    assert!(stmt.execute(&[Value::from("x")]).await.is_err());
}

#[tokio::test]
async fn test_operations_fail_after_close() {
    let conn = memory_with_table().await;
    let stmt = conn
        .prepare("INSERT INTO items (name) VALUES (?)")
        .await
        .expect("Failed to prepare");

    assert!(!conn.is_closed());
    conn.ping().await.expect("ping on open connection");
    conn.close().await.expect("close should succeed");
    assert!(conn.is_closed());
    conn.close().await.expect("closing twice is a no-op");

    let err = stmt.execute(&[Value::from("x")]).await.expect_err("statement outlived connection");
    assert!(err.is_connection_error());
    assert!(conn.prepare("SELECT 1").await.is_err());
    assert!(conn.ping().await.is_err());
}

#[test]
fn test_open_rejects_missing_parent_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing").join("db.sqlite");
    let result = SqliteConnection::open(&path.to_string_lossy());
    assert!(matches!(result, Err(FastSqlError::Connection(_))));
}

#[test]
fn test_open_file_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("batches.db");
    let conn = SqliteConnection::open(&path.to_string_lossy()).expect("open file db");
    assert_eq!(conn.path(), path.to_string_lossy());
    assert!(path.exists());
}
