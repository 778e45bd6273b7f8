//! Generic record envelope shared by every synchronized collection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix that marks identities assigned before remote confirmation.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Identity of a record.
///
/// A record starts with a `Local` identity and is given a `Remote` one by the
/// document store once the write is confirmed. The serialized form is a plain
/// string; the `local_` prefix decides which variant a string decodes into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordId {
    Local(String),
    Remote(String),
}

impl RecordId {
    pub fn local_from_millis(millis: i64) -> Self {
        Self::Local(format!("{}{}", LOCAL_ID_PREFIX, millis))
    }

    pub fn remote(id: impl Into<String>) -> Self {
        Self::Remote(id.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Local(value) | Self::Remote(value) => value,
        }
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        if value.starts_with(LOCAL_ID_PREFIX) {
            Self::Local(value)
        } else {
            Self::Remote(value)
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        match value {
            RecordId::Local(v) | RecordId::Remote(v) => v,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two partners a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerTag {
    #[default]
    Persona1,
    Persona2,
}

/// How a collection orders its in-memory list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrdering {
    /// `createdAt` when present, else the effective date; most recent first.
    CreatedDesc,
    /// Effective date, soonest first.
    EffectiveDateAsc,
}

/// Static description of one synchronized collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name in the remote document store.
    pub name: &'static str,
    /// Key under which the local backup of the collection is stored.
    pub backup_key: &'static str,
    pub ordering: RecordOrdering,
}

/// Domain-specific payload of a record.
///
/// The sync logic never looks inside the body; it only needs to know which
/// collection the body belongs to and a short human label for notifications.
pub trait RecordBody:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const COLLECTION: CollectionSpec;

    /// Short label used in user-facing notifications, e.g. `$4.00 Coffee`.
    fn describe(&self) -> String;
}

/// One user-entered fact, as held in memory, in the local backup, and (minus
/// `id`/`createdAt`) in the remote document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    pub id: RecordId,
    pub owner: OwnerTag,
    pub effective_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Record<T> {
    pub fn is_local_only(&self) -> bool {
        self.id.is_local()
    }

    /// Instant used for ordering: `createdAt`, falling back to midnight UTC of
    /// the effective date.
    pub fn ordering_instant(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_else(|| {
            self.effective_date
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc()
        })
    }
}

/// User input for a new record, before any identity is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft<T> {
    pub owner: OwnerTag,
    pub effective_date: NaiveDate,
    pub body: T,
}

impl<T> RecordDraft<T> {
    pub fn new(owner: OwnerTag, effective_date: NaiveDate, body: T) -> Self {
        Self {
            owner,
            effective_date,
            body,
        }
    }
}

/// Hands out `local_<millis>` identities that never repeat within a process,
/// even when two records are created in the same millisecond.
#[derive(Debug, Default)]
pub struct LocalIdGenerator {
    last: AtomicI64,
}

impl LocalIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_at(&self, now_millis: i64) -> RecordId {
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_millis.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return RecordId::local_from_millis(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    pub fn next(&self) -> RecordId {
        self.next_at(Utc::now().timestamp_millis())
    }
}
