//! Connection and prepared statement traits

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Compile `sql` once so it can be executed repeatedly.
    ///
    /// The returned statement is only valid while this connection is open.
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>>;

    /// Verify the connection is still alive
    async fn ping(&self) -> Result<()> {
        self.query("SELECT 1", &[]).await.map(|_| ())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A prepared statement
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// The SQL text this statement was prepared from
    fn sql(&self) -> &str;

    /// Execute the prepared statement with parameters
    async fn execute(&self, params: &[Value]) -> Result<StatementResult>;

    /// Query the prepared statement with parameters
    async fn query(&self, params: &[Value]) -> Result<QueryResult>;

    /// Release the statement.
    ///
    /// Closing twice is a no-op. Executing a closed statement fails.
    async fn close(&self) -> Result<()>;
}
