//! [`RemoteStore`] backed by the cloud document API.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

use duofolio_core::sync::{CollectionQuery, ConfigStream, DocumentRef, FeedStream, RemoteStore};
use duofolio_core::Result;

use crate::client::DocumentStoreClient;
use crate::feed::{polling_config_feed, polling_feed};
use crate::settings::CloudSyncSettings;

#[derive(Debug, Clone)]
pub struct CloudDocumentStore {
    client: DocumentStoreClient,
    poll_interval: Duration,
}

impl CloudDocumentStore {
    pub fn new(client: DocumentStoreClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    pub fn from_settings(settings: &CloudSyncSettings) -> Result<Self> {
        let client = DocumentStoreClient::from_settings(settings)?;
        Ok(Self::new(client, settings.poll_interval))
    }

    pub fn client(&self) -> &DocumentStoreClient {
        &self.client
    }
}

#[async_trait]
impl RemoteStore for CloudDocumentStore {
    async fn listen(&self, query: &CollectionQuery) -> Result<FeedStream> {
        // Fail fast when the store is unreachable so the caller can fall back.
        let snapshot = self
            .client
            .list_documents(&query.collection, &query.partition)
            .await?;
        Ok(polling_feed(
            self.client.clone(),
            query.clone(),
            self.poll_interval,
            Some(snapshot),
        ))
    }

    async fn add(
        &self,
        collection: &str,
        partition: &str,
        data: Map<String, Value>,
    ) -> Result<DocumentRef> {
        Ok(self.client.add_document(collection, partition, &data).await?)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        Ok(self.client.delete_document(collection, id).await?)
    }

    async fn get_config(&self, partition: &str) -> Result<Option<Map<String, Value>>> {
        Ok(self.client.get_config(partition).await?)
    }

    async fn merge_config(&self, partition: &str, patch: Map<String, Value>) -> Result<()> {
        Ok(self.client.merge_config(partition, &patch).await?)
    }

    async fn listen_config(&self, partition: &str) -> Result<ConfigStream> {
        let current = self.client.get_config(partition).await?;
        Ok(polling_config_feed(
            self.client.clone(),
            partition.to_string(),
            self.poll_interval,
            Some(current),
        ))
    }

    /// A write shows up in the feed at most one poll interval later.
    fn delivery_lag(&self) -> Duration {
        self.poll_interval
    }
}
