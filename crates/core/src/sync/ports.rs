//! Contracts the coordinator consumes from the remote store and exposes to the host UI.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;
use crate::storage::LocalStore;

use super::model::{CollectionQuery, DocumentRef, FeedUpdate, Notification};

/// Live change feed. Dropping the stream ends the subscription.
pub type FeedStream = BoxStream<'static, Result<FeedUpdate>>;

/// Live view of the partition's configuration document. Each item is the full
/// current document.
pub type ConfigStream = BoxStream<'static, Result<Map<String, Value>>>;

/// Remote document store scoped by partition tag.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a live subscription: an initial snapshot followed by incremental
    /// updates, ordered by creation instant descending.
    async fn listen(&self, query: &CollectionQuery) -> Result<FeedStream>;

    /// Add a document; the store assigns identity and creation instant.
    async fn add(
        &self,
        collection: &str,
        partition: &str,
        data: Map<String, Value>,
    ) -> Result<DocumentRef>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Shared configuration document for the partition, if one exists.
    async fn get_config(&self, partition: &str) -> Result<Option<Map<String, Value>>>;

    /// Merge `patch` into the configuration document, creating it if needed.
    async fn merge_config(&self, partition: &str, patch: Map<String, Value>) -> Result<()>;

    /// Open a live subscription on the configuration document.
    async fn listen_config(&self, partition: &str) -> Result<ConfigStream>;

    /// Upper bound on how long after a write its echo can take to arrive on a
    /// feed. Push-based stores report zero; polling stores their interval.
    fn delivery_lag(&self) -> Duration {
        Duration::ZERO
    }
}

/// Host-side callbacks. Implementations must be cheap and non-blocking; they
/// are invoked from feed tasks.
pub trait SyncEventSink: Send + Sync {
    /// The in-memory collection changed and should be re-rendered.
    fn records_changed(&self, collection: &'static str);

    fn notify(&self, notification: Notification);

    /// A change from the other session was detected; the host should restart
    /// its rendering state from scratch.
    fn force_full_resync(&self, collection: &'static str);

    /// The shared configuration was replaced by a newer remote version.
    fn config_changed(&self);
}

/// The three collaborators every coordinator is wired to.
#[derive(Clone)]
pub struct SyncPorts {
    pub remote: Arc<dyn RemoteStore>,
    pub local: Arc<dyn LocalStore>,
    pub events: Arc<dyn SyncEventSink>,
}

impl SyncPorts {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStore>,
        events: Arc<dyn SyncEventSink>,
    ) -> Self {
        Self {
            remote,
            local,
            events,
        }
    }
}
