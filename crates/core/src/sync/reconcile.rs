//! Pure helpers behind feed reconciliation: batch classification and ordering.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::records::{Record, RecordOrdering};

use super::model::{BatchOrigin, ChangeKind, DocumentChange, FeedUpdate, RemoteDocument};

/// Grace window within which an unknown `added` document is assumed to be the
/// echo of this session's own write.
pub const DEFAULT_GRACE_WINDOW_MS: i64 = 2_000;

/// Decides whether a single change entry was authored by another session.
///
/// The shipped implementation is a timestamp heuristic; a detector that
/// compares write correlation ids can be dropped in without touching the
/// coordinator.
pub trait OriginDetector: Send + Sync {
    fn is_remote_origin(
        &self,
        change: &DocumentChange,
        document: Option<&RemoteDocument>,
        known_locally: bool,
        now: DateTime<Utc>,
    ) -> bool;
}

/// Timestamp-age heuristic.
///
/// Rule:
/// 1. `modified` and `removed` always count as remote-origin
/// 2. `added` counts when the document is unknown locally and its creation
///    instant is older than the grace window
#[derive(Debug, Clone, Copy)]
pub struct GraceWindowDetector {
    grace: Duration,
}

impl GraceWindowDetector {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

impl Default for GraceWindowDetector {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_GRACE_WINDOW_MS))
    }
}

impl OriginDetector for GraceWindowDetector {
    fn is_remote_origin(
        &self,
        change: &DocumentChange,
        document: Option<&RemoteDocument>,
        known_locally: bool,
        now: DateTime<Utc>,
    ) -> bool {
        match change.kind {
            ChangeKind::Modified | ChangeKind::Removed => true,
            ChangeKind::Added => {
                if known_locally {
                    return false;
                }
                // A pending server timestamp means the write is brand new.
                document
                    .and_then(|doc| doc.created_at)
                    .map(|created_at| now - created_at > self.grace)
                    .unwrap_or(false)
            }
        }
    }
}

/// Classify a whole feed batch: one remote-origin entry taints the batch.
pub fn classify_batch(
    update: &FeedUpdate,
    known_ids: &HashSet<String>,
    detector: &dyn OriginDetector,
    now: DateTime<Utc>,
) -> BatchOrigin {
    let remote = update.changes.iter().any(|change| {
        detector.is_remote_origin(
            change,
            update.document(&change.id),
            known_ids.contains(&change.id),
            now,
        )
    });
    if remote {
        BatchOrigin::Remote
    } else {
        BatchOrigin::Local
    }
}

pub fn sort_records<T>(records: &mut [Record<T>], ordering: RecordOrdering) {
    match ordering {
        RecordOrdering::CreatedDesc => {
            records.sort_by(|a, b| b.ordering_instant().cmp(&a.ordering_instant()))
        }
        RecordOrdering::EffectiveDateAsc => records.sort_by(|a, b| {
            a.effective_date
                .cmp(&b.effective_date)
                .then_with(|| a.ordering_instant().cmp(&b.ordering_instant()))
        }),
    }
}
