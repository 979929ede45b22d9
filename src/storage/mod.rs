pub mod postgres;
mod rows;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{SessionQuery, Storage, StorageError, StorageResult};
