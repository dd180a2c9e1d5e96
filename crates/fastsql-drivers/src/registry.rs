//! Driver registry for looking up database drivers by name

use fastsql_core::{Connection, DatabaseDriver, FastSqlError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));

        registry
    }

    /// Register a new driver, replacing any driver with the same name
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering database driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&name.to_lowercase()).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names
    pub fn list(&self) -> Vec<&str> {
        self.drivers.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(&name.to_lowercase())
    }

    /// Parse `connection_string` with the named driver and connect
    pub async fn connect(
        &self,
        driver_name: &str,
        connection_string: &str,
    ) -> Result<Arc<dyn Connection>> {
        let driver = self.get(driver_name).ok_or_else(|| {
            FastSqlError::NotFound(format!("No database driver registered as '{}'", driver_name))
        })?;
        let config = driver.parse_connection_string(connection_string)?;
        driver.connect(&config).await
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = DriverRegistry::new();
        assert!(registry.list().is_empty());
        assert!(!registry.has("sqlite"));
        assert!(registry.get("sqlite").is_none());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_defaults_include_sqlite() {
        let registry = DriverRegistry::with_defaults();
        assert!(registry.has("sqlite"));
        assert!(registry.has("SQLite"));
        assert_eq!(registry.get("sqlite").map(|d| d.display_name()), Some("SQLite"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_connect_by_name() {
        let registry = DriverRegistry::with_defaults();
        let conn = registry
            .connect("sqlite", ":memory:")
            .await
            .expect("Failed to connect");
        assert_eq!(conn.driver_name(), "sqlite");
        conn.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn test_connect_unknown_driver() {
        let registry = DriverRegistry::new();
        let err = registry
            .connect("oracle", "scott/tiger")
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, FastSqlError::NotFound(_)));
    }
}
