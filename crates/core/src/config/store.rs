//! Remote-backed shared configuration with a local backup.

use futures::StreamExt;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::errors::Result;
use crate::storage::{read_json, write_json};
use crate::sync::{Notification, Severity, SyncPorts};

use super::model::SharedConfig;

/// Local backup key of the shared configuration.
pub const SHARED_CONFIG_BACKUP_KEY: &str = "shared_config";

/// Where the configuration currently in memory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Remote,
    Backup,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigUpdateOutcome {
    Synced,
    /// Remote merge failed; the change lives only in memory and the backup.
    LocalOnly,
}

pub struct SharedConfigStore {
    partition: String,
    ports: SyncPorts,
    current: Mutex<SharedConfig>,
    feed_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SharedConfigStore {
    pub fn new(partition: impl Into<String>, ports: SyncPorts) -> Self {
        Self {
            partition: partition.into(),
            ports,
            current: Mutex::new(SharedConfig::default()),
            feed_task: tokio::sync::Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedConfig> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> SharedConfig {
        self.lock().clone()
    }

    /// Replace the in-memory config with the local backup, if there is one.
    pub fn load_backup(&self) -> bool {
        match read_json::<SharedConfig>(self.ports.local.as_ref(), SHARED_CONFIG_BACKUP_KEY) {
            Ok(Some(config)) => {
                *self.lock() = config;
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("[SharedConfig] Failed to read backup: {}", err);
                false
            }
        }
    }

    /// Fetch the partition's config document, falling back to the backup.
    pub async fn load(&self) -> ConfigSource {
        match self.ports.remote.get_config(&self.partition).await {
            Ok(Some(fields)) => {
                *self.lock() = SharedConfig::new(fields);
                self.persist_backup();
                debug!("[SharedConfig] Loaded from remote for '{}'", self.partition);
                ConfigSource::Remote
            }
            Ok(None) => {
                debug!("[SharedConfig] No remote document for '{}'", self.partition);
                self.fallback_source()
            }
            Err(err) => {
                warn!("[SharedConfig] Remote load failed, using backup: {}", err);
                self.fallback_source()
            }
        }
    }

    /// Follow the remote config document so the partner's edits show up
    /// live. Any previous subscription is torn down first.
    pub async fn subscribe(self: &Arc<Self>) -> Result<()> {
        let mut feed_task = self.feed_task.lock().await;
        if let Some(previous) = feed_task.take() {
            previous.abort();
            let _ = previous.await;
        }

        let mut stream = self.ports.remote.listen_config(&self.partition).await?;
        let worker = Arc::clone(self);
        *feed_task = Some(tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(fields) => {
                        worker.apply_remote(fields);
                    }
                    Err(err) => error!("[SharedConfig] Feed error: {}", err),
                }
            }
            warn!("[SharedConfig] Feed ended by the remote store");
        }));
        info!("[SharedConfig] Listening on '{}'", self.partition);
        Ok(())
    }

    pub async fn unsubscribe(&self) {
        if let Some(previous) = self.feed_task.lock().await.take() {
            previous.abort();
            let _ = previous.await;
        }
    }

    /// Replace the in-memory config with a remote version. Returns false when
    /// nothing changed.
    pub fn apply_remote(&self, fields: Map<String, Value>) -> bool {
        {
            let mut current = self.lock();
            if current.fields() == &fields {
                return false;
            }
            *current = SharedConfig::new(fields);
        }
        self.persist_backup();
        debug!("[SharedConfig] Remote update applied");
        self.ports.events.config_changed();
        true
    }

    fn fallback_source(&self) -> ConfigSource {
        if self.load_backup() {
            ConfigSource::Backup
        } else {
            ConfigSource::Default
        }
    }

    /// Merge `patch` locally, then into the remote document. Never overwrites
    /// fields the patch does not mention.
    pub async fn update(&self, patch: Map<String, Value>) -> ConfigUpdateOutcome {
        self.lock().merge(&patch);
        self.persist_backup();

        match self.ports.remote.merge_config(&self.partition, patch).await {
            Ok(()) => {
                info!("[SharedConfig] Merged update into '{}'", self.partition);
                self.ports
                    .events
                    .notify(Notification::new(Severity::Success, "Settings saved"));
                ConfigUpdateOutcome::Synced
            }
            Err(err) => {
                warn!("[SharedConfig] Remote merge failed, kept locally: {}", err);
                self.ports.events.notify(Notification::new(
                    Severity::Warning,
                    "Settings saved (local only)",
                ));
                ConfigUpdateOutcome::LocalOnly
            }
        }
    }

    fn persist_backup(&self) {
        let snapshot = self.current();
        if let Err(err) = write_json(
            self.ports.local.as_ref(),
            SHARED_CONFIG_BACKUP_KEY,
            &snapshot,
        ) {
            warn!("[SharedConfig] Failed to persist backup: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use crate::testing::{wait_until, FakeRemoteStore, Harness, SyncEvent};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn load_prefers_remote_and_refreshes_backup() {
        let remote = FakeRemoteStore::new();
        remote.set_config(object(json!({ "presupuesto": 800 })));
        let harness = Harness::new(remote);
        let store = SharedConfigStore::new("nuestra_pareja", harness.ports());

        assert_eq!(store.load().await, ConfigSource::Remote);
        assert_eq!(store.current().weekly_budget(), dec!(800));
        assert!(harness
            .local
            .get(SHARED_CONFIG_BACKUP_KEY)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn load_falls_back_to_backup_then_defaults() {
        let harness = Harness::new(FakeRemoteStore::offline());
        let store = SharedConfigStore::new("nuestra_pareja", harness.ports());
        assert_eq!(store.load().await, ConfigSource::Default);

        harness
            .local
            .set(SHARED_CONFIG_BACKUP_KEY, r#"{"presupuesto":300}"#)
            .unwrap();
        assert_eq!(store.load().await, ConfigSource::Backup);
        assert_eq!(store.current().weekly_budget(), dec!(300));
    }

    #[tokio::test]
    async fn update_merges_without_dropping_fields() {
        let remote = FakeRemoteStore::new();
        remote.set_config(object(json!({
            "nombres": { "persona1": "Ana", "persona2": "Luis" },
            "presupuesto": 1000
        })));
        let harness = Harness::new(remote.clone());
        let store = SharedConfigStore::new("nuestra_pareja", harness.ports());
        store.load().await;

        let outcome = store
            .update(object(json!({ "nombres": { "persona2": "Lu" } })))
            .await;

        assert_eq!(outcome, ConfigUpdateOutcome::Synced);
        let names = store.current().partner_names();
        assert_eq!(names.persona1, "Ana");
        assert_eq!(names.persona2, "Lu");
        assert_eq!(
            remote.config().unwrap(),
            object(json!({
                "nombres": { "persona1": "Ana", "persona2": "Lu" },
                "presupuesto": 1000
            }))
        );
    }

    #[tokio::test]
    async fn failed_remote_merge_is_kept_locally() {
        let remote = FakeRemoteStore::new();
        remote.fail_config.store(true, Ordering::SeqCst);
        let harness = Harness::new(remote);
        let store = SharedConfigStore::new("nuestra_pareja", harness.ports());

        let outcome = store.update(object(json!({ "presupuesto": 42 }))).await;

        assert_eq!(outcome, ConfigUpdateOutcome::LocalOnly);
        assert_eq!(store.current().weekly_budget(), dec!(42));
        let restored = SharedConfigStore::new("nuestra_pareja", harness.ports());
        assert!(restored.load_backup());
        assert_eq!(restored.current().weekly_budget(), dec!(42));
        let notes = harness.sink.notifications();
        assert_eq!(notes.last().unwrap().severity, Severity::Warning);
    }

    #[tokio::test]
    async fn partner_edits_arrive_through_the_live_feed() {
        let remote = FakeRemoteStore::new();
        let harness = Harness::new(remote.clone());
        let store = Arc::new(SharedConfigStore::new("nuestra_pareja", harness.ports()));
        store.subscribe().await.unwrap();

        remote.push_config(object(json!({ "nombres": { "persona2": "Lu" } })));

        wait_until(|| store.current().partner_names().persona2 == "Lu").await;
        assert!(harness.sink.events().contains(&SyncEvent::ConfigChanged));
        let restored = SharedConfigStore::new("nuestra_pareja", harness.ports());
        assert!(restored.load_backup());
        assert_eq!(restored.current().partner_names().persona2, "Lu");
    }

    #[tokio::test]
    async fn resubscribing_keeps_one_config_feed() {
        let remote = FakeRemoteStore::new();
        let harness = Harness::new(remote.clone());
        let store = Arc::new(SharedConfigStore::new("nuestra_pareja", harness.ports()));

        store.subscribe().await.unwrap();
        store.subscribe().await.unwrap();
        assert_eq!(remote.active_config_feeds(), 1);

        store.unsubscribe().await;
        assert_eq!(remote.active_config_feeds(), 0);
    }

    #[tokio::test]
    async fn unchanged_remote_config_is_not_reapplied() {
        let harness = Harness::new(FakeRemoteStore::new());
        let store = SharedConfigStore::new("nuestra_pareja", harness.ports());
        let fields = object(json!({ "presupuesto": 700 }));

        assert!(store.apply_remote(fields.clone()));
        assert!(!store.apply_remote(fields));
        let changes = harness
            .sink
            .events()
            .into_iter()
            .filter(|event| *event == SyncEvent::ConfigChanged)
            .count();
        assert_eq!(changes, 1);
    }
}
