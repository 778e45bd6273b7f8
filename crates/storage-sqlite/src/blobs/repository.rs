use chrono::Utc;
use diesel::prelude::*;
use log::debug;
use std::sync::Arc;

use duofolio_core::storage::LocalStore;
use duofolio_core::Result;

use super::model::LocalBlobDB;
use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::local_blobs;

/// [`LocalStore`] backed by the `local_blobs` table. Survives restarts.
pub struct SqliteLocalStore {
    pool: Arc<DbPool>,
}

impl SqliteLocalStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Every stored key, for diagnostics.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let keys = local_blobs::table
            .select(local_blobs::key)
            .order(local_blobs::key.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(keys)
    }
}

impl LocalStore for SqliteLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let row = local_blobs::table
            .find(key)
            .select(LocalBlobDB::as_select())
            .first::<LocalBlobDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().to_rfc3339();
        let row = LocalBlobDB {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: now.clone(),
        };
        diesel::insert_into(local_blobs::table)
            .values(&row)
            .on_conflict(local_blobs::key)
            .do_update()
            .set((
                local_blobs::value.eq(value),
                local_blobs::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        debug!("[LocalStore] Wrote {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::delete(local_blobs::table.find(key))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }
}
