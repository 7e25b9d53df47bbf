//! Snapshot store.
//!
//! Holds the current snapshot behind an atomically swappable pointer plus a
//! bounded history of recent versions kept as weak references.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;
use lru::LruCache;
use tracing::{debug, warn};

use super::lock::mutex_lock;
use super::snapshot::Snapshot;

const SOURCE: &str = "cache::store";

pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    history: Mutex<LruCache<u64, Weak<Snapshot>>>,
}

impl SnapshotStore {
    /// Create a store whose current snapshot is the empty version 0.
    pub fn new(retained_versions: NonZeroUsize) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            history: Mutex::new(LruCache::new(retained_versions)),
        }
    }

    /// The snapshot readers should use right now. Never blocks.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn current_version(&self) -> u64 {
        self.current.load().version()
    }

    /// Version the next published snapshot must carry.
    pub fn next_version(&self) -> u64 {
        self.current_version() + 1
    }

    /// Swap `snapshot` in as current.
    ///
    /// A snapshot that is not newer than the current one is rejected and
    /// `false` is returned.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> bool {
        let version = snapshot.version();
        let mut history = mutex_lock(&self.history, SOURCE, "publish");

        let previous = self.current.load_full();
        if version <= previous.version() {
            warn!(
                version,
                current = previous.version(),
                "Refusing to publish stale snapshot"
            );
            return false;
        }

        history.put(version, Arc::downgrade(&snapshot));
        self.current.store(snapshot);
        debug!(version, replaced = previous.version(), "Snapshot published");
        true
    }

    /// Look up a recent version that is still referenced somewhere.
    pub fn get(&self, version: u64) -> Option<Arc<Snapshot>> {
        let current = self.current.load_full();
        if current.version() == version {
            return Some(current);
        }

        let mut history = mutex_lock(&self.history, SOURCE, "get");
        let snapshot = history.get(&version).and_then(Weak::upgrade);
        if snapshot.is_none() {
            history.pop(&version);
        }
        snapshot
    }

    /// Versions in the history that are still alive, newest first.
    pub fn live_versions(&self) -> Vec<u64> {
        let history = mutex_lock(&self.history, SOURCE, "live_versions");
        let mut versions: Vec<u64> = history
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(version, _)| *version)
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions
    }
}
