//! Polling live feeds: lists a collection (or reads the config document) on
//! an interval and turns consecutive snapshots into updates.

use futures::stream::BoxStream;
use futures::StreamExt;
use log::{debug, error, info, warn};
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

use duofolio_core::sync::{
    ChangeKind, CollectionQuery, ConfigStream, DocumentChange, FeedStream, FeedUpdate,
    RemoteDocument,
};

use crate::client::DocumentStoreClient;
use crate::error::{ApiRetryClass, Result};

const FEED_BASE_BACKOFF_MS: u64 = 250;
const FEED_MAX_BACKOFF_MS: u64 = 8_000;

pub(crate) fn backoff_with_jitter(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff = (FEED_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(FEED_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

/// Diff two snapshots. Entries follow `current`'s order, removals come last.
pub fn diff_snapshots(
    previous: &[RemoteDocument],
    current: &[RemoteDocument],
) -> Vec<DocumentChange> {
    let before: HashMap<&str, &RemoteDocument> =
        previous.iter().map(|doc| (doc.id.as_str(), doc)).collect();
    let after: HashMap<&str, &RemoteDocument> =
        current.iter().map(|doc| (doc.id.as_str(), doc)).collect();

    let mut changes = Vec::new();
    for doc in current {
        match before.get(doc.id.as_str()) {
            None => changes.push(DocumentChange::new(ChangeKind::Added, doc.id.clone())),
            Some(old) if old.created_at != doc.created_at || old.data != doc.data => {
                changes.push(DocumentChange::new(ChangeKind::Modified, doc.id.clone()))
            }
            Some(_) => {}
        }
    }
    for doc in previous {
        if !after.contains_key(doc.id.as_str()) {
            changes.push(DocumentChange::new(ChangeKind::Removed, doc.id.clone()));
        }
    }
    changes
}

/// Start polling `query` and return the feed. The task exits once the
/// returned stream is dropped, or after an error that retrying cannot fix.
///
/// `initial` is a snapshot the caller already fetched; it is delivered
/// first and the next request waits one full interval.
pub fn polling_feed(
    client: DocumentStoreClient,
    query: CollectionQuery,
    interval: Duration,
    initial: Option<Vec<RemoteDocument>>,
) -> FeedStream {
    let tag = format!("[CloudSync:{}]", query.collection);
    let mut previous: Option<Vec<RemoteDocument>> = None;
    spawn_poller(
        tag,
        interval,
        initial,
        move || {
            let client = client.clone();
            let query = query.clone();
            async move {
                client
                    .list_documents(&query.collection, &query.partition)
                    .await
            }
        },
        move |snapshot: Vec<RemoteDocument>| {
            let changes = diff_snapshots(previous.as_deref().unwrap_or_default(), &snapshot);
            let first = previous.replace(snapshot.clone()).is_none();
            (first || !changes.is_empty()).then(|| FeedUpdate::new(changes, snapshot))
        },
    )
}

/// Poll the partition's config document. Emits the fields whenever they
/// differ from the last emitted version; a missing document emits nothing.
pub fn polling_config_feed(
    client: DocumentStoreClient,
    partition: String,
    interval: Duration,
    initial: Option<Option<Map<String, Value>>>,
) -> ConfigStream {
    let tag = format!("[CloudSync:config/{}]", partition);
    let mut previous: Option<Map<String, Value>> = None;
    spawn_poller(
        tag,
        interval,
        initial,
        move || {
            let client = client.clone();
            let partition = partition.clone();
            async move { client.get_config(&partition).await }
        },
        move |fields: Option<Map<String, Value>>| {
            let fields = fields?;
            if previous.as_ref() == Some(&fields) {
                return None;
            }
            previous = Some(fields.clone());
            Some(fields)
        },
    )
}

/// Shared polling loop. `poll` fetches a snapshot, `emit` turns it into the
/// next stream item or `None` when there is nothing new.
fn spawn_poller<S, U, P, Fut, E>(
    tag: String,
    interval: Duration,
    initial: Option<S>,
    mut poll: P,
    mut emit: E,
) -> BoxStream<'static, duofolio_core::Result<U>>
where
    S: Send + 'static,
    U: Send + 'static,
    P: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
    E: FnMut(S) -> Option<U> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<duofolio_core::Result<U>>();
    tokio::spawn(async move {
        let mut pending = initial.map(Ok);
        let mut failures = 0_usize;
        info!("{} Polling every {}ms", tag, interval.as_millis());

        loop {
            let polled = match pending.take() {
                Some(snapshot) => snapshot,
                None => poll().await,
            };
            let delay = match polled {
                Ok(snapshot) => {
                    failures = 0;
                    if let Some(item) = emit(snapshot) {
                        debug!("{} Delivering update", tag);
                        if tx.send(Ok(item)).is_err() {
                            break;
                        }
                    }
                    interval
                }
                Err(err) => match err.retry_class() {
                    ApiRetryClass::Retryable => {
                        failures += 1;
                        let delay = backoff_with_jitter(failures);
                        warn!(
                            "{} Poll failed (attempt {}), retrying in {}ms: {}",
                            tag,
                            failures,
                            delay.as_millis(),
                            err
                        );
                        if tx.send(Err(err.into())).is_err() {
                            break;
                        }
                        delay
                    }
                    class => {
                        error!(
                            "{} Poll failed with {:?} error (status {:?}), stopping: {}",
                            tag,
                            class,
                            err.status_code(),
                            err
                        );
                        let _ = tx.send(Err(err.into()));
                        break;
                    }
                },
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tx.closed() => break,
            }
        }
        debug!("{} Feed stopped", tag);
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}
