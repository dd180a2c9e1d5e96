//! fastsql drivers - concrete implementations of the `fastsql-core` traits
//!
//! Each driver lives in its own crate and is enabled through a cargo feature.

#[cfg(feature = "sqlite")]
pub use fastsql_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from fastsql-core
pub use fastsql_core::{
    Connection, ConnectionConfig, DatabaseDriver, DriverCapabilities, FastSqlError,
    PreparedStatement, QueryResult, Result, Row, StatementResult, Value,
};
