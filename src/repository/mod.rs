//! Database plumbing shared by persistent stores.

pub mod pool;
pub mod util;

pub use pool::{DbError, SqliteConn, SqlitePool};
