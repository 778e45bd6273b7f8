//! Cloud document store for duofolio: REST client, polling live feed, and the
//! [`RemoteStore`](duofolio_core::sync::RemoteStore) implementation built on them.

pub mod client;
pub mod error;
pub mod feed;
pub mod settings;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::DocumentStoreClient;
pub use error::{ApiRetryClass, CloudSyncError, Result};
pub use settings::CloudSyncSettings;
pub use store::CloudDocumentStore;
