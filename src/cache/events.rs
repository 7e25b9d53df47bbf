//! Change notifications and the single-slot pending queue.
//!
//! Change sets arrive at least once from the content store. They are merged
//! into one pending batch that the next rebuild cycle takes whole, so any
//! number of notifications during a rebuild collapse into a single follow-up
//! cycle.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::content::ContentId;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic ordering of changes within this process.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub id: ContentId,
    pub kind: ChangeKind,
}

/// One notification from the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Delivery id. Redelivered change sets carry the same id.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub changes: Vec<ContentChange>,
    #[serde(default)]
    pub full_invalidate: bool,
    #[serde(default = "OffsetDateTime::now_utc", with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}

impl ChangeSet {
    pub fn new(changes: Vec<ContentChange>) -> Self {
        Self {
            id: Uuid::new_v4(),
            changes,
            full_invalidate: false,
            issued_at: OffsetDateTime::now_utc(),
        }
    }

    /// Invalidate everything; the next cycle rebuilds from scratch.
    pub fn full() -> Self {
        Self {
            full_invalidate: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn created(id: ContentId) -> Self {
        Self::new(vec![ContentChange {
            id,
            kind: ChangeKind::Created,
        }])
    }

    pub fn updated(id: ContentId) -> Self {
        Self::new(vec![ContentChange {
            id,
            kind: ChangeKind::Updated,
        }])
    }

    pub fn removed(id: ContentId) -> Self {
        Self::new(vec![ContentChange {
            id,
            kind: ChangeKind::Removed,
        }])
    }

    pub fn is_empty(&self) -> bool {
        !self.full_invalidate && self.changes.is_empty()
    }
}

/// Everything accumulated since the last cycle took the pending slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingBatch {
    pub full_invalidate: bool,
    /// Latest change per content id.
    pub changes: HashMap<ContentId, (Epoch, ChangeKind)>,
    /// Number of change sets merged into this batch.
    pub merged: usize,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        !self.full_invalidate && self.changes.is_empty()
    }

    fn record(&mut self, id: ContentId, epoch: Epoch, kind: ChangeKind) {
        self.changes
            .entry(id)
            .and_modify(|(current, current_kind)| {
                if epoch > *current {
                    *current = epoch;
                    *current_kind = kind;
                }
            })
            .or_insert((epoch, kind));
    }

    fn absorb(&mut self, other: PendingBatch) {
        self.full_invalidate |= other.full_invalidate;
        self.merged += other.merged;
        for (id, (epoch, kind)) in other.changes {
            self.record(id, epoch, kind);
        }
    }
}

pub struct ChangeQueue {
    pending: Mutex<PendingBatch>,
    seen: Mutex<LruCache<Uuid, ()>>,
    epoch_counter: AtomicU64,
}

impl ChangeQueue {
    pub fn new(dedupe_window: NonZeroUsize) -> Self {
        Self {
            pending: Mutex::new(PendingBatch::default()),
            seen: Mutex::new(LruCache::new(dedupe_window)),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Merge a change set into the pending slot.
    ///
    /// Returns `false` when the set was empty or already seen.
    pub fn push(&self, change_set: ChangeSet) -> bool {
        if change_set.is_empty() {
            debug!(change_set_id = %change_set.id, "Ignoring empty change set");
            return false;
        }

        if mutex_lock(&self.seen, SOURCE, "push.dedupe")
            .put(change_set.id, ())
            .is_some()
        {
            debug!(change_set_id = %change_set.id, "Ignoring redelivered change set");
            return false;
        }

        let epoch = self.next_epoch();
        info!(
            change_set_id = %change_set.id,
            change_epoch = epoch,
            changes = change_set.changes.len(),
            full_invalidate = change_set.full_invalidate,
            "Change set enqueued"
        );

        let mut pending = mutex_lock(&self.pending, SOURCE, "push");
        pending.full_invalidate |= change_set.full_invalidate;
        pending.merged += 1;
        for change in change_set.changes {
            pending.record(change.id, epoch, change.kind);
        }
        true
    }

    /// Take the whole pending batch, leaving the slot empty.
    pub fn take(&self) -> Option<PendingBatch> {
        let mut pending = mutex_lock(&self.pending, SOURCE, "take");
        if pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut *pending))
    }

    /// Put a batch back after a failed cycle. Changes that arrived in the
    /// meantime keep precedence when they are newer.
    pub fn restore(&self, batch: PendingBatch) {
        mutex_lock(&self.pending, SOURCE, "restore").absorb(batch);
    }

    /// Number of content ids waiting, with a full invalidate counted as one.
    pub fn len(&self) -> usize {
        let pending = mutex_lock(&self.pending, SOURCE, "len");
        pending.changes.len() + usize::from(pending.full_invalidate)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> ChangeQueue {
        ChangeQueue::new(NonZeroUsize::new(4).expect("non-zero"))
    }

    #[test]
    fn pushes_merge_into_one_batch() {
        let queue = queue();
        assert!(queue.push(ChangeSet::updated(ContentId(1))));
        assert!(queue.push(ChangeSet::created(ContentId(2))));
        assert!(queue.push(ChangeSet::removed(ContentId(1))));

        let batch = queue.take().expect("batch");
        assert_eq!(batch.merged, 3);
        assert_eq!(batch.changes.len(), 2);
        assert_eq!(
            batch.changes.get(&ContentId(1)).map(|(_, kind)| *kind),
            Some(ChangeKind::Removed)
        );
        assert!(queue.take().is_none());
    }

    #[test]
    fn redelivered_change_sets_are_ignored() {
        let queue = queue();
        let set = ChangeSet::updated(ContentId(7));
        assert!(queue.push(set.clone()));
        assert!(!queue.push(set));
        assert_eq!(queue.take().map(|b| b.merged), Some(1));
    }

    #[test]
    fn empty_change_sets_are_ignored() {
        let queue = queue();
        assert!(!queue.push(ChangeSet::new(Vec::new())));
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_keeps_newer_changes() {
        let queue = queue();
        assert!(queue.push(ChangeSet::updated(ContentId(1))));
        let failed = queue.take().expect("batch");

        assert!(queue.push(ChangeSet::removed(ContentId(1))));
        assert!(queue.push(ChangeSet::full()));
        queue.restore(failed);

        let batch = queue.take().expect("batch");
        assert!(batch.full_invalidate);
        assert_eq!(batch.merged, 3);
        assert_eq!(
            batch.changes.get(&ContentId(1)).map(|(_, kind)| *kind),
            Some(ChangeKind::Removed)
        );
    }

    #[test]
    fn len_counts_ids_and_full_invalidate() {
        let queue = queue();
        assert!(queue.push(ChangeSet::updated(ContentId(1))));
        assert!(queue.push(ChangeSet::updated(ContentId(1))));
        assert!(queue.push(ChangeSet::full()));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn change_set_json_defaults() {
        let set: ChangeSet =
            serde_json::from_str(r#"{"changes":[{"id":3,"kind":"removed"}]}"#).expect("json");
        assert!(!set.full_invalidate);
        assert_eq!(
            set.changes,
            [ContentChange {
                id: ContentId(3),
                kind: ChangeKind::Removed
            }]
        );
    }
}
