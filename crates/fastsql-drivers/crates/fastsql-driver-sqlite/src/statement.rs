//! SQLite prepared statement

use async_trait::async_trait;
use fastsql_core::{FastSqlError, PreparedStatement, QueryResult, Result, StatementResult, Value};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connection::{SharedConnection, execute_statement, query_statement, with_open};

/// A statement compiled against a [`crate::SqliteConnection`].
///
/// rusqlite statements borrow their connection, so the compiled form lives
/// in the connection's statement cache and this handle re-fetches it by SQL
/// text on every call.
pub struct SqlitePreparedStatement {
    conn: SharedConnection,
    sql: String,
    closed: AtomicBool,
}

impl SqlitePreparedStatement {
    pub(crate) fn new(conn: SharedConnection, sql: String) -> Self {
        Self {
            conn,
            sql,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FastSqlError::Query("Prepared statement is closed".into()));
        }
        Ok(())
    }

    /// Whether `close` has been called on this handle
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreparedStatement for SqlitePreparedStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    #[tracing::instrument(skip(self, params), fields(param_count = params.len()))]
    async fn execute(&self, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        with_open(&self.conn, |conn| {
            let mut stmt = conn
                .prepare_cached(&self.sql)
                .map_err(|e| FastSqlError::Query(format!("Failed to prepare statement: {}", e)))?;
            execute_statement(conn, &mut stmt, params)
        })
    }

    #[tracing::instrument(skip(self, params), fields(param_count = params.len()))]
    async fn query(&self, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        with_open(&self.conn, |conn| {
            let mut stmt = conn
                .prepare_cached(&self.sql)
                .map_err(|e| FastSqlError::Query(format!("Failed to prepare query: {}", e)))?;
            query_statement(&mut stmt, params)
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(sql_preview = %self.sql.chars().take(100).collect::<String>(), "prepared statement released");
        Ok(())
    }
}
