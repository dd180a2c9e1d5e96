//! SQLite database driver implementation

mod connection;
mod driver;
mod statement;

pub use connection::SqliteConnection;
pub use driver::SqliteDriver;
pub use statement::SqlitePreparedStatement;
