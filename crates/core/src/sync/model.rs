//! Change-feed and notification models exchanged with the remote store and the host UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::Result;
use crate::records::{Record, RecordBody};

/// Kind of a single entry in a change-feed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    /// Remote identity of the document the change refers to.
    pub id: String,
}

impl DocumentChange {
    pub fn new(kind: ChangeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// A document as stored remotely: identity and creation instant are owned by
/// the store, everything else lives in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Identity and creation instant assigned by the store to a new document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One delivery of the live feed: the delta plus the full current snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedUpdate {
    pub changes: Vec<DocumentChange>,
    pub snapshot: Vec<RemoteDocument>,
}

impl FeedUpdate {
    pub fn new(changes: Vec<DocumentChange>, snapshot: Vec<RemoteDocument>) -> Self {
        Self { changes, snapshot }
    }

    pub fn document(&self, id: &str) -> Option<&RemoteDocument> {
        self.snapshot.iter().find(|doc| doc.id == id)
    }
}

/// A collection query scoped to the shared partition, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionQuery {
    pub collection: String,
    pub partition: String,
}

impl CollectionQuery {
    pub fn new(collection: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            partition: partition.into(),
        }
    }
}

/// Severity tag attached to user-facing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Whether the in-memory collection may hold unconfirmed records or mirrors
/// the last remote snapshot exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionAuthority {
    PendingLocal,
    RemoteSnapshot,
}

/// Result of the startup connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    Remote,
    LocalOnly,
}

/// Heuristic verdict on who authored a feed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrigin {
    /// Echo of this session's own writes.
    Local,
    /// Probably written by the other partner's session.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub origin: BatchOrigin,
    pub record_count: usize,
    /// Snapshot documents that could not be decoded and were skipped.
    pub skipped: usize,
}

impl ReconcileOutcome {
    pub fn resync_scheduled(&self) -> bool {
        self.origin == BatchOrigin::Remote
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Local-only record removed from memory and backup.
    RemovedLocally,
    /// Remote delete accepted; the feed will remove the record.
    RemoteDeleteRequested,
    /// Remote delete failed; the record is kept.
    RemoteDeleteFailed,
    NotFound,
}

/// Decode a snapshot document into a typed record.
pub fn decode_document<T: RecordBody>(document: &RemoteDocument) -> Result<Record<T>> {
    let mut object = document.data.clone();
    object.insert("id".to_string(), Value::String(document.id.clone()));
    match document.created_at {
        Some(created_at) => {
            object.insert("createdAt".to_string(), serde_json::to_value(created_at)?);
        }
        None => {
            object.remove("createdAt");
        }
    }
    Ok(serde_json::from_value(Value::Object(object))?)
}

/// Encode a record into the document body sent to the store. Identity and
/// creation instant are stripped because the store assigns both.
pub fn encode_record_data<T: RecordBody>(record: &Record<T>) -> Result<Map<String, Value>> {
    let mut data = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    data.remove("id");
    data.remove("createdAt");
    Ok(data)
}
