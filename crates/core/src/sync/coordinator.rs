//! Per-collection sync coordinator: local backup, remote change feed, and
//! reconciliation between the two.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{ConfigUpdateOutcome, SharedConfigStore};
use crate::errors::Result;
use crate::records::{CollectionSpec, LocalIdGenerator, Record, RecordBody, RecordDraft, RecordId};
use crate::settings::SyncSettings;
use crate::storage::{read_json, write_json};

use super::model::{
    decode_document, encode_record_data, BatchOrigin, CollectionAuthority, CollectionQuery,
    ConnectionMode, DeleteOutcome, FeedUpdate, Notification, ReconcileOutcome, Severity,
};
use super::ports::SyncPorts;
use super::reconcile::{classify_batch, sort_records, GraceWindowDetector, OriginDetector};

struct CollectionState<T> {
    records: Vec<Record<T>>,
    authority: CollectionAuthority,
}

struct CoordinatorInner<T: RecordBody> {
    spec: CollectionSpec,
    settings: SyncSettings,
    ports: SyncPorts,
    config: Arc<SharedConfigStore>,
    detector: Arc<dyn OriginDetector>,
    ids: LocalIdGenerator,
    state: Mutex<CollectionState<T>>,
    feed_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Keeps one domain's in-memory record list consistent with the remote
/// change feed while allowing local writes and an offline backup.
///
/// Cloning is cheap; clones share the same collection and feed.
pub struct RecordSyncCoordinator<T: RecordBody> {
    inner: Arc<CoordinatorInner<T>>,
}

impl<T: RecordBody> Clone for RecordSyncCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RecordBody> RecordSyncCoordinator<T> {
    /// Build a coordinator using the grace-window heuristic, widened by the
    /// remote store's delivery lag.
    pub fn new(ports: SyncPorts, config: Arc<SharedConfigStore>, settings: SyncSettings) -> Self {
        let grace = settings.grace_window_for(ports.remote.delivery_lag());
        let detector = Arc::new(GraceWindowDetector::new(grace));
        Self::with_detector(ports, config, settings, detector)
    }

    pub fn with_detector(
        ports: SyncPorts,
        config: Arc<SharedConfigStore>,
        settings: SyncSettings,
        detector: Arc<dyn OriginDetector>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                spec: T::COLLECTION,
                settings,
                ports,
                config,
                detector,
                ids: LocalIdGenerator::new(),
                state: Mutex::new(CollectionState {
                    records: Vec::new(),
                    authority: CollectionAuthority::PendingLocal,
                }),
                feed_task: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn collection(&self) -> &'static str {
        self.inner.spec.name
    }

    /// Snapshot of the current ordered collection.
    pub fn records(&self) -> Vec<Record<T>> {
        self.inner.lock_state().records.clone()
    }

    pub fn authority(&self) -> CollectionAuthority {
        self.inner.lock_state().authority
    }

    /// Load the local backup into memory and re-render. Returns the number
    /// of records loaded.
    pub fn load_backup(&self) -> usize {
        let inner = &self.inner;
        let loaded = match read_json::<Vec<Record<T>>>(
            inner.ports.local.as_ref(),
            inner.spec.backup_key,
        ) {
            Ok(Some(mut records)) => {
                sort_records(&mut records, inner.spec.ordering);
                let count = records.len();
                let mut state = inner.lock_state();
                state.records = records;
                state.authority = CollectionAuthority::PendingLocal;
                count
            }
            Ok(None) => 0,
            Err(err) => {
                warn!("{} Failed to read backup: {}", inner.tag(), err);
                0
            }
        };
        debug!("{} Loaded {} records from backup", inner.tag(), loaded);
        inner.ports.events.records_changed(inner.spec.name);
        loaded
    }

    /// Two-phase startup: the backup is loaded before this returns, the
    /// remote feed is attempted in the background after the startup delay.
    pub fn initialize(&self) -> JoinHandle<ConnectionMode> {
        self.load_backup();
        let this = self.clone();
        tokio::spawn(async move {
            let delay = this.inner.settings.startup_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            this.connect().await
        })
    }

    /// Establish the feed and tell the user which mode we ended up in.
    pub async fn connect(&self) -> ConnectionMode {
        let inner = &self.inner;
        match self.subscribe().await {
            Ok(()) => {
                inner.notify(
                    Severity::Success,
                    format!("{} connected to the cloud", inner.spec.name),
                );
                ConnectionMode::Remote
            }
            Err(err) => {
                warn!("{} Remote unavailable, staying local: {}", inner.tag(), err);
                inner.notify(
                    Severity::Warning,
                    format!("Using local data for {}", inner.spec.name),
                );
                ConnectionMode::LocalOnly
            }
        }
    }

    /// (Re)establish the remote change feed. Any previous feed is cancelled
    /// and fully torn down first, so at most one feed is ever active.
    pub async fn subscribe(&self) -> Result<()> {
        let inner = &self.inner;
        let mut feed_task = inner.feed_task.lock().await;
        if let Some(previous) = feed_task.take() {
            previous.abort();
            let _ = previous.await;
            debug!("{} Previous feed cancelled", inner.tag());
        }

        let query = CollectionQuery::new(inner.spec.name, inner.settings.partition.clone());
        let mut stream = inner.ports.remote.listen(&query).await.map_err(|err| {
            error!("{} Failed to establish feed: {}", inner.tag(), err);
            err
        })?;

        let worker = Arc::clone(inner);
        *feed_task = Some(tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(update) => {
                        worker.reconcile(update, Utc::now());
                    }
                    Err(err) => error!("{} Feed error: {}", worker.tag(), err),
                }
            }
            // Only reached when the store ends the feed; cancellation drops this task.
            warn!("{} Feed ended by the remote store", worker.tag());
            worker.notify(
                Severity::Warning,
                format!("Live sync stopped for {}", worker.spec.name),
            );
        }));
        info!(
            "{} Listening on partition '{}'",
            inner.tag(),
            inner.settings.partition
        );
        Ok(())
    }

    /// Cancel the active feed, if any.
    pub async fn unsubscribe(&self) {
        if let Some(previous) = self.inner.feed_task.lock().await.take() {
            previous.abort();
            let _ = previous.await;
            debug!("{} Feed cancelled", self.inner.tag());
        }
    }

    /// Run reconciliation for one feed delivery.
    ///
    /// Safe to call outside a Tokio runtime; the delayed resync signal then
    /// runs on a plain thread.
    pub fn apply_feed_update(&self, update: FeedUpdate) -> ReconcileOutcome {
        self.inner.reconcile(update, Utc::now())
    }

    /// Same as [`apply_feed_update`](Self::apply_feed_update) with an explicit clock.
    pub fn apply_feed_update_at(
        &self,
        update: FeedUpdate,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        self.inner.reconcile(update, now)
    }

    /// Create a record. It is NOT added to the visible collection: the feed
    /// echo of the remote write is what makes it appear, which keeps the same
    /// record from showing up twice. The returned handle resolves to the
    /// record under its final identity.
    pub fn create(&self, draft: RecordDraft<T>) -> JoinHandle<Record<T>> {
        let inner = Arc::clone(&self.inner);
        let record = Record {
            id: inner.ids.next(),
            owner: draft.owner,
            effective_date: draft.effective_date,
            created_at: Some(Utc::now()),
            body: draft.body,
        };
        inner.notify(
            Severity::Info,
            format!("Saving {}...", record.body.describe()),
        );
        tokio::spawn(async move { inner.write_new_record(record).await })
    }

    /// Delete a record. Remote records are deleted through the store and
    /// disappear when the feed reports the removal; local-only records are
    /// dropped right away.
    pub async fn delete(&self, id: &RecordId) -> DeleteOutcome {
        let inner = &self.inner;
        match id {
            RecordId::Local(_) => {
                let removed = {
                    let mut state = inner.lock_state();
                    let before = state.records.len();
                    state.records.retain(|record| &record.id != id);
                    state.records.len() != before
                };
                if !removed {
                    debug!("{} No local record {}", inner.tag(), id);
                    return DeleteOutcome::NotFound;
                }
                inner.persist_backup();
                inner.ports.events.records_changed(inner.spec.name);
                inner.notify(Severity::Success, "Deleted (local)");
                DeleteOutcome::RemovedLocally
            }
            RecordId::Remote(remote_id) => {
                inner.notify(Severity::Info, "Deleting...");
                match inner.ports.remote.delete(inner.spec.name, remote_id).await {
                    Ok(()) => {
                        info!("{} Delete requested for {}", inner.tag(), remote_id);
                        DeleteOutcome::RemoteDeleteRequested
                    }
                    Err(err) => {
                        warn!(
                            "{} Remote delete of {} failed: {}",
                            inner.tag(),
                            remote_id,
                            err
                        );
                        inner.notify(
                            Severity::Warning,
                            "Could not delete from the cloud, record kept",
                        );
                        DeleteOutcome::RemoteDeleteFailed
                    }
                }
            }
        }
    }

    /// Merge a partial update into the partition's shared configuration.
    pub async fn update_shared_config(&self, patch: Map<String, Value>) -> ConfigUpdateOutcome {
        self.inner.config.update(patch).await
    }

    pub fn shared_config(&self) -> Arc<SharedConfigStore> {
        Arc::clone(&self.inner.config)
    }
}

impl<T: RecordBody> CoordinatorInner<T> {
    fn tag(&self) -> String {
        format!("[RecordSync:{}]", self.spec.name)
    }

    fn lock_state(&self) -> MutexGuard<'_, CollectionState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, severity: Severity, message: impl Into<String>) {
        self.ports
            .events
            .notify(Notification::new(severity, message));
    }

    fn persist_backup(&self) {
        let records = self.lock_state().records.clone();
        if let Err(err) = write_json(self.ports.local.as_ref(), self.spec.backup_key, &records) {
            warn!("{} Failed to persist backup: {}", self.tag(), err);
        }
    }

    fn clear_backup(&self) {
        if let Err(err) = self.ports.local.remove(self.spec.backup_key) {
            warn!("{} Failed to clear backup: {}", self.tag(), err);
        }
    }

    fn reconcile(&self, update: FeedUpdate, now: DateTime<Utc>) -> ReconcileOutcome {
        debug!("{} {} changes received", self.tag(), update.changes.len());
        for change in &update.changes {
            debug!("{}   {}: {}", self.tag(), change.kind, change.id);
        }

        let known_ids: HashSet<String> = self
            .lock_state()
            .records
            .iter()
            .map(|record| record.id.as_str().to_string())
            .collect();
        let origin = classify_batch(&update, &known_ids, self.detector.as_ref(), now);

        if origin == BatchOrigin::Remote {
            info!("{} Remote change detected, clearing cache", self.tag());
            self.lock_state().records.clear();
            self.clear_backup();
        }

        let mut skipped = 0;
        let mut records = Vec::with_capacity(update.snapshot.len());
        for document in &update.snapshot {
            match decode_document::<T>(document) {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    warn!("{} Skipping document {}: {}", self.tag(), document.id, err);
                }
            }
        }
        sort_records(&mut records, self.spec.ordering);
        let record_count = records.len();

        {
            let mut state = self.lock_state();
            state.records = records;
            state.authority = CollectionAuthority::RemoteSnapshot;
        }
        self.ports.events.records_changed(self.spec.name);
        self.persist_backup();

        if origin == BatchOrigin::Remote {
            self.schedule_full_resync();
        }

        ReconcileOutcome {
            origin,
            record_count,
            skipped,
        }
    }

    fn schedule_full_resync(&self) {
        let events = Arc::clone(&self.ports.events);
        let delay = self.settings.resync_delay;
        let collection = self.spec.name;
        info!("{} Full resync in {}ms", self.tag(), delay.as_millis());
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    events.force_full_resync(collection);
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    events.force_full_resync(collection);
                });
            }
        }
    }

    async fn write_new_record(&self, mut record: Record<T>) -> Record<T> {
        let label = record.body.describe();
        let written = match encode_record_data(&record) {
            Ok(data) => {
                self.ports
                    .remote
                    .add(self.spec.name, &self.settings.partition, data)
                    .await
            }
            Err(err) => Err(err),
        };

        match written {
            Ok(document) => {
                debug!("{} {} confirmed as {}", self.tag(), record.id, document.id);
                record.id = RecordId::remote(document.id);
                if document.created_at.is_some() {
                    record.created_at = document.created_at;
                }
                self.notify(Severity::Success, format!("{} saved", label));
            }
            Err(err) => {
                warn!(
                    "{} Remote write failed, keeping {} locally: {}",
                    self.tag(),
                    record.id,
                    err
                );
                self.keep_local_only(&record);
                self.notify(Severity::Warning, format!("{} saved (local only)", label));
            }
        }
        self.persist_backup();
        record
    }

    fn keep_local_only(&self, record: &Record<T>) {
        {
            let mut state = self.lock_state();
            if state.records.iter().all(|existing| existing.id != record.id) {
                state.records.push(record.clone());
                sort_records(&mut state.records, self.spec.ordering);
            }
            state.authority = CollectionAuthority::PendingLocal;
        }
        self.ports.events.records_changed(self.spec.name);
    }
}
