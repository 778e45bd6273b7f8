//! SQLite persistence for the duofolio local backup.

pub mod blobs;
pub mod db;
pub mod errors;
pub mod schema;

pub use blobs::SqliteLocalStore;
pub use db::{create_pool, get_connection, init, run_migrations, DbPool};
pub use errors::StorageError;

use std::sync::Arc;

/// Open (creating and migrating if needed) the store under `app_data_dir`.
pub fn open_local_store(app_data_dir: &str) -> duofolio_core::Result<Arc<SqliteLocalStore>> {
    let db_path = init(app_data_dir)?;
    run_migrations(&db_path)?;
    let pool = create_pool(&db_path)?;
    Ok(Arc::new(SqliteLocalStore::new(pool)))
}
