/// Shared infrastructure concerns
///
/// Store setup used by the cache module and the worker binary.
pub mod database;

pub use database::{Database, DbConnection, DbPool};
