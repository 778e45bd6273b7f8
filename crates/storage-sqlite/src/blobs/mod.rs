mod model;
mod repository;

pub use model::LocalBlobDB;
pub use repository::SqliteLocalStore;
