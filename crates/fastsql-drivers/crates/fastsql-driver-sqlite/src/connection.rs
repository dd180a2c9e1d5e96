//! SQLite connection implementation

use async_trait::async_trait;
use fastsql_core::{
    ColumnMeta, Connection, FastSqlError, PreparedStatement, QueryResult, Result, Row,
    StatementResult, Value,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use std::sync::Arc;
use std::time::Duration;

use crate::SqlitePreparedStatement;

/// Number of compiled statements rusqlite keeps per connection.
///
/// Batches settle into a handful of row counts per query shape, so this only
/// needs to cover shapes x distinct row counts.
const STATEMENT_CACHE_CAPACITY: usize = 64;

/// rusqlite connection shared between a connection and its prepared statements.
///
/// `None` once the connection has been closed.
pub(crate) type SharedConnection = Arc<Mutex<Option<RusqliteConnection>>>;

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: SharedConnection,
    path: String,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                FastSqlError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.exists()
                {
                    return Err(FastSqlError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                FastSqlError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            FastSqlError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| FastSqlError::Connection(format!("Failed to set journal mode: {}", e)))?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
            FastSqlError::Connection(format!("Failed to set synchronous mode: {}", e))
        })?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: expanded_path,
        })
    }

    /// Path (or URI) this connection was opened against
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Set how long SQLite waits on a locked database before failing
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        with_open(&self.conn, |conn| {
            conn.busy_timeout(timeout)
                .map_err(|e| FastSqlError::Configuration(format!("Failed to set busy timeout: {}", e)))
        })
    }

    /// Execute multiple SQL statements in one call, e.g. schema setup scripts
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL batch");
        with_open(&self.conn, |conn| {
            conn.execute_batch(sql)
                .map_err(|e| FastSqlError::Query(format!("Failed to execute batch: {}", e)))
        })
    }

    /// Expand path to handle ~ (home directory) and relative paths
    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                let home_path = std::path::PathBuf::from(home);
                home_path.join(rest).to_string_lossy().to_string()
            } else {
                return Err(FastSqlError::Configuration(
                    "Unable to determine HOME directory".into(),
                ));
            }
        } else if path.starts_with('~') {
            return Err(FastSqlError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        let result = if path_buf.is_relative() {
            std::env::current_dir()
                .map_err(FastSqlError::Io)?
                .join(path_buf)
                .to_string_lossy()
                .to_string()
        } else {
            expanded
        };

        Ok(result)
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        with_open(&self.conn, |conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| FastSqlError::Query(format!("Failed to prepare statement: {}", e)))?;
            execute_statement(conn, &mut stmt, params)
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        with_open(&self.conn, |conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| FastSqlError::Query(format!("Failed to prepare query: {}", e)))?;
            query_statement(&mut stmt, params)
        })
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>> {
        with_open(&self.conn, |conn| {
            // Compiling through the cache both validates the SQL and leaves the
            // compiled statement ready for the first execute.
            conn.prepare_cached(sql)
                .map_err(|e| FastSqlError::Query(format!("Failed to prepare statement: {}", e)))?;
            Ok(())
        })?;

        tracing::debug!("statement prepared");
        Ok(Arc::new(SqlitePreparedStatement::new(
            Arc::clone(&self.conn),
            sql.to_string(),
        )))
    }

    async fn ping(&self) -> Result<()> {
        with_open(&self.conn, |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| FastSqlError::Connection(format!("Ping failed: {}", e)))
        })
    }

    async fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().take() else {
            tracing::debug!("SQLite connection already closed");
            return Ok(());
        };

        tracing::info!(path = %self.path, "closing SQLite connection");
        conn.close().map_err(|(_, e)| {
            tracing::error!(error = %e, "failed to close SQLite connection");
            FastSqlError::Connection(format!("Failed to close SQLite connection: {}", e))
        })
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

/// Run `f` against the open rusqlite connection, failing once it has been closed
pub(crate) fn with_open<T>(
    shared: &SharedConnection,
    f: impl FnOnce(&RusqliteConnection) -> Result<T>,
) -> Result<T> {
    let guard = shared.lock();
    let conn = guard
        .as_ref()
        .ok_or_else(|| FastSqlError::Connection("SQLite connection is closed".into()))?;
    f(conn)
}

pub(crate) fn execute_statement(
    conn: &RusqliteConnection,
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> Result<StatementResult> {
    let rusqlite_params = values_to_rusqlite(params);
    let rows_affected = stmt
        .execute(params_from_iter(rusqlite_params.iter()))
        .map_err(|e| FastSqlError::Query(format!("Failed to execute statement: {}", e)))?;

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(StatementResult {
        affected_rows: rows_affected as u64,
        last_insert_id: Some(conn.last_insert_rowid()),
    })
}

pub(crate) fn query_statement(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let rusqlite_params = values_to_rusqlite(params);

    let mut column_names: Vec<String> = Vec::with_capacity(stmt.column_count());
    let mut columns: Vec<ColumnMeta> = Vec::with_capacity(stmt.column_count());
    for (idx, col) in stmt.columns().iter().enumerate() {
        let name = col.name().to_string();
        column_names.push(name.clone());
        columns.push(ColumnMeta {
            name,
            data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
            ordinal: idx,
        });
    }

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(rusqlite_params.iter()))
        .map_err(|e| FastSqlError::Query(format!("Failed to execute query: {}", e)))?;

    while let Some(row) = query_rows
        .next()
        .map_err(|e| FastSqlError::Query(format!("Failed to fetch row: {}", e)))?
    {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(rusqlite_to_value(row, i)?);
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms = execution_time_ms,
        "query executed successfully"
    );
    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms,
    })
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int32(i) => rusqlite::types::Value::Integer(*i as i64),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::Decimal(d) => rusqlite::types::Value::Text(d.clone()),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Date(d) => rusqlite::types::Value::Text(d.to_string()),
        Value::Time(t) => rusqlite::types::Value::Text(t.to_string()),
        Value::DateTime(dt) => rusqlite::types::Value::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => rusqlite::types::Value::Text(dt.to_rfc3339()),
        Value::Json(j) => rusqlite::types::Value::Text(j.to_string()),
        Value::Uuid(u) => rusqlite::types::Value::Text(u.to_string()),
    }
}

fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| FastSqlError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}

#[cfg(test)]
mod tests;
