//! fastsql core - shared abstractions for the batching engine and its drivers
//!
//! This crate defines the traits and types that the engine and every driver
//! crate depend on:
//!
//! - `DatabaseDriver` - Trait for database driver implementations
//! - `Connection` - Trait for database connections
//! - `PreparedStatement` - Trait for compiled statements owned by a connection
//! - Common types like `Value`, `Row`, `QueryResult`, etc.

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
