//! Database model for the local key-value backup table.

use diesel::prelude::*;

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(primary_key(key))]
#[diesel(table_name = crate::schema::local_blobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LocalBlobDB {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
