//! In-process fakes for the sync ports.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::merge_json;
use crate::errors::{Error, Result};
use crate::settings::SyncSettings;
use crate::storage::{InMemoryLocalStore, LocalStore};
use crate::sync::{
    CollectionQuery, ConfigStream, DocumentRef, FeedStream, FeedUpdate, Notification,
    RemoteDocument, RemoteStore, SyncEventSink, SyncPorts,
};

pub fn server_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

#[derive(Default)]
pub struct FakeRemoteStore {
    feeds: Mutex<Vec<UnboundedSender<Result<FeedUpdate>>>>,
    config_feeds: Mutex<Vec<UnboundedSender<Result<Map<String, Value>>>>>,
    delivery_lag: Mutex<Duration>,
    next_ids: Mutex<VecDeque<String>>,
    deleted: Mutex<Vec<String>>,
    added: Mutex<Vec<Map<String, Value>>>,
    config: Mutex<Option<Map<String, Value>>>,
    pub listen_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_listen: AtomicBool,
    pub fail_add: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_config: AtomicBool,
}

impl FakeRemoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn offline() -> Arc<Self> {
        let store = Self::default();
        store.fail_listen.store(true, Ordering::SeqCst);
        store.fail_add.store(true, Ordering::SeqCst);
        store.fail_delete.store(true, Ordering::SeqCst);
        store.fail_config.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn with_delivery_lag(lag: Duration) -> Arc<Self> {
        let store = Self::default();
        *store.delivery_lag.lock().unwrap() = lag;
        Arc::new(store)
    }

    pub fn queue_id(&self, id: &str) {
        self.next_ids.lock().unwrap().push_back(id.to_string());
    }

    pub fn set_config(&self, fields: Map<String, Value>) {
        *self.config.lock().unwrap() = Some(fields);
    }

    pub fn config(&self) -> Option<Map<String, Value>> {
        self.config.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn added(&self) -> Vec<Map<String, Value>> {
        self.added.lock().unwrap().clone()
    }

    /// Feeds whose consumer is still alive.
    pub fn active_feeds(&self) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|feed| !feed.is_closed())
            .count()
    }

    pub fn active_config_feeds(&self) -> usize {
        self.config_feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|feed| !feed.is_closed())
            .count()
    }

    /// Deliver a config document to every live config feed.
    pub fn push_config(&self, fields: Map<String, Value>) {
        for feed in self.config_feeds.lock().unwrap().iter() {
            let _ = feed.unbounded_send(Ok(fields.clone()));
        }
    }

    /// End every open feed, as a store does after a fatal error.
    pub fn end_feeds(&self) {
        self.feeds.lock().unwrap().clear();
    }

    /// Deliver to the most recently opened live feed.
    pub fn push(&self, item: Result<FeedUpdate>) {
        let feeds = self.feeds.lock().unwrap();
        let feed = feeds
            .iter()
            .rev()
            .find(|feed| !feed.is_closed())
            .expect("no live feed");
        feed.unbounded_send(item).expect("feed closed");
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn listen(&self, _query: &CollectionQuery) -> Result<FeedStream> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listen.load(Ordering::SeqCst) {
            return Err(Error::remote("listen refused"));
        }
        let (tx, rx) = unbounded();
        self.feeds.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }

    async fn add(
        &self,
        _collection: &str,
        _partition: &str,
        data: Map<String, Value>,
    ) -> Result<DocumentRef> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Error::remote("add refused"));
        }
        self.added.lock().unwrap().push(data);
        let id = self
            .next_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "generated".to_string());
        Ok(DocumentRef {
            id,
            created_at: Some(server_time()),
        })
    }

    async fn delete(&self, _collection: &str, id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::remote("delete refused"));
        }
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn get_config(&self, _partition: &str) -> Result<Option<Map<String, Value>>> {
        if self.fail_config.load(Ordering::SeqCst) {
            return Err(Error::remote("config unavailable"));
        }
        Ok(self.config())
    }

    async fn merge_config(&self, _partition: &str, patch: Map<String, Value>) -> Result<()> {
        if self.fail_config.load(Ordering::SeqCst) {
            return Err(Error::remote("config unavailable"));
        }
        let mut config = self.config.lock().unwrap();
        merge_json(config.get_or_insert_with(Map::new), &patch);
        Ok(())
    }

    async fn listen_config(&self, _partition: &str) -> Result<ConfigStream> {
        if self.fail_config.load(Ordering::SeqCst) {
            return Err(Error::remote("config unavailable"));
        }
        let (tx, rx) = unbounded();
        self.config_feeds.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }

    fn delivery_lag(&self) -> Duration {
        *self.delivery_lag.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    RecordsChanged(&'static str),
    Notified(Notification),
    FullResync(&'static str),
    ConfigChanged,
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn resyncs(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SyncEvent::FullResync(_)))
            .count()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Notified(notification) => Some(notification),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl SyncEventSink for RecordingSink {
    fn records_changed(&self, collection: &'static str) {
        self.events
            .lock()
            .unwrap()
            .push(SyncEvent::RecordsChanged(collection));
    }

    fn notify(&self, notification: Notification) {
        self.events
            .lock()
            .unwrap()
            .push(SyncEvent::Notified(notification));
    }

    fn force_full_resync(&self, collection: &'static str) {
        self.events
            .lock()
            .unwrap()
            .push(SyncEvent::FullResync(collection));
    }

    fn config_changed(&self) {
        self.events.lock().unwrap().push(SyncEvent::ConfigChanged);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Set(String),
    Remove(String),
}

/// In-memory store that also records every write, in order.
#[derive(Default)]
pub struct RecordingLocalStore {
    inner: InMemoryLocalStore,
    ops: Mutex<Vec<StoreOp>>,
}

impl RecordingLocalStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl LocalStore for RecordingLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ops.lock().unwrap().push(StoreOp::Set(key.to_string()));
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.ops
            .lock()
            .unwrap()
            .push(StoreOp::Remove(key.to_string()));
        self.inner.remove(key)
    }
}

pub struct Harness {
    pub remote: Arc<FakeRemoteStore>,
    pub local: Arc<InMemoryLocalStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(remote: Arc<FakeRemoteStore>) -> Self {
        Self {
            remote,
            local: Arc::new(InMemoryLocalStore::new()),
            sink: RecordingSink::new(),
        }
    }

    pub fn ports(&self) -> SyncPorts {
        SyncPorts::new(self.remote.clone(), self.local.clone(), self.sink.clone())
    }
}

pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        resync_delay: Duration::from_millis(50),
        startup_delay: Duration::ZERO,
        ..SyncSettings::default()
    }
}

pub fn expense_document(id: &str, created_at: DateTime<Utc>, description: &str) -> RemoteDocument {
    let data = json!({
        "owner": "persona1",
        "effectiveDate": "2026-03-14",
        "amount": 4.0,
        "description": description,
        "category": "comida",
    });
    RemoteDocument {
        id: id.to_string(),
        created_at: Some(created_at),
        data: data.as_object().cloned().unwrap_or_default(),
    }
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
