//! Prepared statement cache keyed by text

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fastsql_core::{Connection, FastSqlError, PreparedStatement, Result};
use tokio::sync::RwLock;

/// Prepared statements owned by a [`crate::BatchEngine`].
///
/// Entries are keyed either by their SQL text (collapsed batch statements) or
/// by a caller-chosen name. A key is prepared at most once while the cache is
/// open; lookups only take the read lock.
pub struct StatementCache {
    label: &'static str,
    statements: RwLock<HashMap<String, Arc<dyn PreparedStatement>>>,
    prepared: AtomicU64,
}

impl StatementCache {
    /// Create an empty cache; `label` only appears in log output
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            statements: RwLock::new(HashMap::new()),
            prepared: AtomicU64::new(0),
        }
    }

    /// Look up a cached statement
    pub async fn get(&self, key: &str) -> Option<Arc<dyn PreparedStatement>> {
        self.statements.read().await.get(key).cloned()
    }

    /// Return the statement prepared for `sql`, preparing it on first use
    pub async fn get_or_prepare(
        &self,
        conn: &dyn Connection,
        sql: &str,
    ) -> Result<Arc<dyn PreparedStatement>> {
        self.prepare_keyed(conn, sql, sql).await
    }

    /// Return the statement cached under `key`, preparing `sql` when the key
    /// is new. A key whose cached SQL differs from `sql` is re-prepared and
    /// the old statement released.
    ///
    /// Nothing is stored when the prepare fails.
    pub async fn prepare_keyed(
        &self,
        conn: &dyn Connection,
        key: &str,
        sql: &str,
    ) -> Result<Arc<dyn PreparedStatement>> {
        if let Some(stmt) = self.statements.read().await.get(key)
            && stmt.sql() == sql
        {
            tracing::trace!(cache = self.label, "prepared statement cache hit");
            return Ok(Arc::clone(stmt));
        }

        let mut statements = self.statements.write().await;
        // Another task may have prepared the same key while we waited.
        if let Some(stmt) = statements.get(key)
            && stmt.sql() == sql
        {
            return Ok(Arc::clone(stmt));
        }

        let stmt = conn.prepare(sql).await?;
        self.prepared.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            cache = self.label,
            sql_preview = %sql.chars().take(100).collect::<String>(),
            "prepared statement cached"
        );

        if let Some(replaced) = statements.insert(key.to_string(), Arc::clone(&stmt)) {
            drop(statements);
            if let Err(e) = replaced.close().await {
                tracing::warn!(cache = self.label, error = %e, "failed to release replaced statement");
            }
        }

        Ok(stmt)
    }

    /// Number of cached statements
    pub async fn len(&self) -> usize {
        self.statements.read().await.len()
    }

    /// Whether the cache holds no statements
    pub async fn is_empty(&self) -> bool {
        self.statements.read().await.is_empty()
    }

    /// Total prepare calls issued through this cache
    pub fn prepare_count(&self) -> u64 {
        self.prepared.load(Ordering::Relaxed)
    }

    /// Remove and release every cached statement.
    ///
    /// Every statement is attempted; failures are logged and returned rather
    /// than stopping the release of the rest.
    pub async fn close_all(&self) -> Vec<FastSqlError> {
        let drained: Vec<_> = self.statements.write().await.drain().collect();
        let total = drained.len();
        let mut errors = Vec::new();

        for (key, stmt) in drained {
            if let Err(e) = stmt.close().await {
                tracing::warn!(
                    cache = self.label,
                    key_preview = %key.chars().take(100).collect::<String>(),
                    error = %e,
                    "failed to release prepared statement"
                );
                errors.push(e);
            }
        }

        tracing::debug!(
            cache = self.label,
            released = total - errors.len(),
            failed = errors.len(),
            "prepared statements released"
        );
        errors
    }
}
