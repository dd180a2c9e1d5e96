//! fastsql - batched INSERTs in front of a database connection
//!
//! Callers hand the engine ordinary single-row INSERT statements together
//! with the bound parameters for that row. Rows are buffered per distinct
//! statement text and, once `flush_threshold` rows have accumulated, collapsed
//! into one multi-row INSERT that runs as a single prepared statement:
//!
//! ```ignore
//! use fastsql::{BatchEngine, Value};
//!
//! let engine = BatchEngine::open("sqlite", "sqlite:///tmp/app.db", 100).await?;
//! for (id, name) in rows {
//!     engine
//!         .insert("INSERT INTO users(id, name) VALUES(?, ?)", &[Value::from(id), Value::from(name)])
//!         .await?;
//! }
//! engine.close().await?; // flushes whatever is still pending
//! ```
//!
//! Prepared statements are cached by their collapsed SQL text, so a shape that
//! always flushes at the threshold compiles exactly once.

mod accumulator;
mod config;
mod engine;
mod error;
mod splitter;
mod statement_cache;
mod stats;

#[cfg(test)]
mod testing;

pub use accumulator::BatchAccumulator;
pub use config::{BatchConfig, DEFAULT_FLUSH_THRESHOLD};
pub use engine::BatchEngine;
pub use error::{BatchError, Result};
pub use splitter::{QueryShape, split};
pub use statement_cache::StatementCache;
pub use stats::BatchStats;

pub use fastsql_core::{Connection, PreparedStatement, QueryResult, StatementResult, Value};
pub use fastsql_drivers::DriverRegistry;
