//! SQLite driver implementation

use async_trait::async_trait;
use fastsql_core::{
    Connection, ConnectionConfig, DatabaseDriver, DriverCapabilities, FastSqlError, Result,
};
use std::sync::Arc;
use std::time::Duration;

use crate::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn display_name(&self) -> &'static str {
        "SQLite"
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            supports_prepared_statements: true,
            supports_multi_row_insert: true,
            max_parameters: Some(32_766),
        }
    }

    #[tracing::instrument(skip(self, config), fields(path = config.get_string("path").as_deref()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let path = config.get_string("path").ok_or_else(|| {
            FastSqlError::Configuration(
                "SQLite requires a 'path' or 'database' parameter, e.g. /path/to/database.db or :memory:".into(),
            )
        })?;

        let conn = SqliteConnection::open(&path).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            e
        })?;

        if let Some(raw) = config.get_string("busy_timeout") {
            let millis = raw.parse::<u64>().map_err(|_| {
                FastSqlError::Configuration(format!(
                    "busy_timeout must be a number of milliseconds, got '{}'",
                    raw
                ))
            })?;
            conn.set_busy_timeout(Duration::from_millis(millis))?;
        }

        tracing::info!(path = %path, "SQLite connection created");
        Ok(Arc::new(conn))
    }

    /// Accepts `:memory:`, `sqlite::memory:`, `sqlite://<path>`, `file:` URIs
    /// and plain paths. `key=value` pairs after `?` become connection params,
    /// except for `file:` URIs which SQLite interprets itself.
    fn parse_connection_string(&self, conn_str: &str) -> Result<ConnectionConfig> {
        let trimmed = conn_str.trim();
        if trimmed.is_empty() {
            return Err(FastSqlError::Configuration(
                "SQLite connection string is empty".into(),
            ));
        }

        if trimmed.starts_with("file:") {
            return Ok(ConnectionConfig::new_sqlite(trimmed));
        }

        let body = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);

        let (path, query) = match body.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (body, None),
        };

        let path = if path.is_empty() || path == ":memory:" {
            ":memory:"
        } else {
            path
        };

        let mut config = ConnectionConfig::new_sqlite(path);
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                FastSqlError::Configuration(format!(
                    "Invalid SQLite connection parameter '{}', expected key=value",
                    pair
                ))
            })?;
            config = config.with_param(key, value);
        }

        Ok(config)
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        config
            .get_string("path")
            .unwrap_or_else(|| ":memory:".to_string())
    }
}
