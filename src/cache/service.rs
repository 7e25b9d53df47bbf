//! Facade service.
//!
//! Owns the snapshot store and the pending change queue. Readers call
//! [`FacadeService::current_snapshot`], which never waits on a rebuild. A
//! single worker loop (or an explicit [`FacadeService::consume`]) takes the
//! pending batch, builds the next snapshot and publishes it with one pointer
//! swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::application::source::{ContentSource, SourceError};
use crate::domain::content::ContentId;
use crate::domain::content_types::{ContentTypeError, ContentTypeRegistry};

use super::config::FacadeConfig;
use super::events::{ChangeQueue, ChangeSet};
use super::planner::RebuildPlan;
use super::snapshot::{Snapshot, SnapshotBuildError, SubtreeChange};
use super::store::SnapshotStore;

pub const METRIC_REBUILD_TOTAL: &str = "folio_facade_rebuild_total";
pub const METRIC_REBUILD_FAILED_TOTAL: &str = "folio_facade_rebuild_failed_total";
pub const METRIC_REBUILD_MS: &str = "folio_facade_rebuild_ms";
pub const METRIC_VERSION: &str = "folio_facade_version";
pub const METRIC_PENDING_CHANGES: &str = "folio_facade_pending_changes";

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid content types: {0}")]
    ContentTypes(#[from] ContentTypeError),
    #[error("snapshot build failed: {0}")]
    Build(#[from] SnapshotBuildError),
}

pub struct FacadeService {
    config: FacadeConfig,
    source: Arc<dyn ContentSource>,
    store: SnapshotStore,
    queue: ChangeQueue,
    build_lock: Mutex<()>,
    wake: Notify,
    initial_requested: AtomicBool,
}

impl FacadeService {
    pub fn new(config: FacadeConfig, source: Arc<dyn ContentSource>) -> Self {
        let store = SnapshotStore::new(config.retained_versions_non_zero());
        let queue = ChangeQueue::new(config.dedupe_window_non_zero());
        Self {
            config,
            source,
            store,
            queue,
            build_lock: Mutex::new(()),
            wake: Notify::new(),
            initial_requested: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &FacadeConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// The current snapshot. Never blocks and never fails.
    ///
    /// Until the first build completes this is the empty version 0; the first
    /// such read enqueues a full build for the worker.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        let snapshot = self.store.current();
        if snapshot.version() == 0 && !self.initial_requested.swap(true, Ordering::SeqCst) {
            debug!("First read before any build; requesting initial snapshot");
            if self.enqueue(ChangeSet::full()) {
                self.wake.notify_one();
            }
        }
        snapshot
    }

    /// Record a change set and wake the worker.
    ///
    /// Returns `false` if the set was empty or a redelivery.
    pub fn notify(&self, change_set: ChangeSet) -> bool {
        let accepted = self.enqueue(change_set);
        if accepted {
            self.wake.notify_one();
        }
        accepted
    }

    pub fn pending_changes(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&self, change_set: ChangeSet) -> bool {
        let accepted = self.queue.push(change_set);
        gauge!(METRIC_PENDING_CHANGES).set(self.queue.len() as f64);
        accepted
    }

    /// Build and publish a snapshot now.
    ///
    /// Without `force_rebuild` an already built facade with nothing pending
    /// returns its current snapshot. Otherwise pending changes are folded
    /// into a full rebuild; if that fails they stay pending and the previous
    /// snapshot remains current.
    #[instrument(skip(self))]
    pub async fn create_snapshot(&self, force_rebuild: bool) -> Result<Arc<Snapshot>, FacadeError> {
        let _guard = self.build_lock.lock().await;

        let current = self.store.current();
        if !force_rebuild && current.version() > 0 && self.queue.is_empty() {
            return Ok(current);
        }

        self.initial_requested.store(true, Ordering::SeqCst);
        let pending = self.queue.take();
        let started_at = Instant::now();

        match self.rebuild_full().await {
            Ok(snapshot) => {
                self.publish(&snapshot, RebuildPlan::Full.mode(), started_at);
                Ok(snapshot)
            }
            Err(err) => {
                if let Some(batch) = pending {
                    self.queue.restore(batch);
                }
                self.record_failure(&err, RebuildPlan::Full.mode());
                Err(err)
            }
        }
    }

    /// Run one rebuild cycle if anything is pending.
    ///
    /// Returns `Ok(true)` when a snapshot was published. On failure the batch
    /// goes back into the pending slot and the previous snapshot stays
    /// current.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> Result<bool, FacadeError> {
        let _guard = self.build_lock.lock().await;

        let Some(batch) = self.queue.take() else {
            return Ok(false);
        };
        gauge!(METRIC_PENDING_CHANGES).set(self.queue.len() as f64);

        let base = self.store.current();
        let plan = RebuildPlan::from_batch(&batch, self.config.incremental_max_changes, base.version() > 0);
        let started_at = Instant::now();

        info!(
            change_sets = batch.merged,
            changed_ids = batch.changes.len(),
            full_invalidate = batch.full_invalidate,
            base_version = base.version(),
            plan = %plan,
            "Facade rebuild starting"
        );

        let outcome = match &plan {
            RebuildPlan::Full => self.rebuild_full().await.map(|s| (s, "full")),
            RebuildPlan::Incremental { replace, remove } => {
                match self.rebuild_incremental(&base, replace, remove).await {
                    Ok(snapshot) => Ok((snapshot, "incremental")),
                    Err(FacadeError::Build(reason)) => {
                        warn!(
                            base_version = base.version(),
                            reason = %reason,
                            "Incremental patch rejected; falling back to full rebuild"
                        );
                        self.rebuild_full().await.map(|s| (s, "full"))
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match outcome {
            Ok((snapshot, mode)) => {
                self.publish(&snapshot, mode, started_at);
                Ok(true)
            }
            Err(err) => {
                self.queue.restore(batch);
                gauge!(METRIC_PENDING_CHANGES).set(self.queue.len() as f64);
                self.record_failure(&err, plan.mode());
                Err(err)
            }
        }
    }

    async fn rebuild_full(&self) -> Result<Arc<Snapshot>, FacadeError> {
        let descriptors = self.source.fetch_content_types().await?;
        let registry = ContentTypeRegistry::from_descriptors(descriptors)?;
        let records = self.source.fetch_published_tree().await?;

        let snapshot = Snapshot::build(self.store.next_version(), Arc::new(registry), records)?;
        Ok(Arc::new(snapshot))
    }

    async fn rebuild_incremental(
        &self,
        base: &Snapshot,
        replace: &[ContentId],
        remove: &[ContentId],
    ) -> Result<Arc<Snapshot>, FacadeError> {
        let mut changes = Vec::with_capacity(replace.len() + remove.len());
        for id in remove {
            changes.push(SubtreeChange::Remove(*id));
        }
        for id in replace {
            let records = self.source.fetch_subtree(*id).await?;
            changes.push(SubtreeChange::Replace { root: *id, records });
        }

        let snapshot = base.patch(self.store.next_version(), &changes)?;
        Ok(Arc::new(snapshot))
    }

    fn publish(&self, snapshot: &Arc<Snapshot>, mode: &'static str, started_at: Instant) {
        if !self.store.publish(Arc::clone(snapshot)) {
            return;
        }

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        counter!(METRIC_REBUILD_TOTAL, "mode" => mode).increment(1);
        histogram!(METRIC_REBUILD_MS, "mode" => mode).record(elapsed_ms);
        gauge!(METRIC_VERSION).set(snapshot.version() as f64);

        info!(
            version = snapshot.version(),
            nodes = snapshot.len(),
            mode,
            elapsed_ms,
            "Facade snapshot published"
        );
    }

    fn record_failure(&self, err: &FacadeError, mode: &'static str) {
        counter!(METRIC_REBUILD_FAILED_TOTAL).increment(1);
        error!(
            error = %err,
            mode,
            current_version = self.store.current_version(),
            pending = self.queue.len(),
            "Facade rebuild failed; keeping previous snapshot"
        );
    }

    /// Spawn the rebuild worker. It stops when `shutdown` is cancelled.
    pub fn spawn_worker(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let facade = Arc::clone(self);
        tokio::spawn(async move { facade.run(shutdown).await })
    }

    /// Worker loop: wait for a wake-up or a refresh tick, then drain.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut refresh = self.config.refresh_interval().map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!(
            refresh_interval_ms = self.config.refresh_interval_ms,
            "Facade worker started"
        );

        // Changes may have arrived before the worker existed.
        self.drain().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tick(&mut refresh) => {
                    debug!("Periodic facade refresh");
                    self.enqueue(ChangeSet::full());
                }
            }
            self.drain().await;
        }

        info!("Facade worker stopped");
    }

    async fn drain(&self) {
        // A failed cycle leaves its batch pending until the next wake-up.
        while let Ok(true) = self.consume().await {}
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::source::select_subtree;
    use crate::cache::snapshot::RouteKey;
    use crate::domain::content::ContentRecord;
    use crate::domain::content_types::ContentTypeDescriptor;

    #[derive(Default)]
    struct FakeSource {
        records: StdMutex<Vec<ContentRecord>>,
        failing: AtomicBool,
        subtree_fetches: StdMutex<Vec<ContentId>>,
    }

    impl FakeSource {
        fn with(records: Vec<ContentRecord>) -> Arc<Self> {
            Arc::new(Self {
                records: StdMutex::new(records),
                ..Default::default()
            })
        }

        fn set(&self, records: Vec<ContentRecord>) {
            *self.records.lock().expect("records") = records;
        }

        fn check(&self) -> Result<(), SourceError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(SourceError::unavailable("offline"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn fetch_content_types(&self) -> Result<Vec<ContentTypeDescriptor>, SourceError> {
            self.check()?;
            Ok(vec![ContentTypeDescriptor::root("page")])
        }

        async fn fetch_published_tree(&self) -> Result<Vec<ContentRecord>, SourceError> {
            self.check()?;
            Ok(self.records.lock().expect("records").clone())
        }

        async fn fetch_subtree(&self, root_id: ContentId) -> Result<Vec<ContentRecord>, SourceError> {
            self.check()?;
            self.subtree_fetches.lock().expect("fetches").push(root_id);
            Ok(select_subtree(&self.records.lock().expect("records"), root_id))
        }
    }

    fn site() -> Vec<ContentRecord> {
        vec![
            ContentRecord::new(1, None, "Home", "page"),
            ContentRecord::new(2, Some(1), "Blog", "page"),
        ]
    }

    fn facade(source: Arc<FakeSource>) -> FacadeService {
        FacadeService::new(FacadeConfig::default(), source)
    }

    #[tokio::test]
    async fn first_read_is_empty_and_requests_a_build() {
        let facade = facade(FakeSource::with(site()));

        let first = facade.current_snapshot();
        assert_eq!(first.version(), 0);
        assert_eq!(facade.pending_changes(), 1);

        // A second read does not enqueue again.
        let _ = facade.current_snapshot();
        assert_eq!(facade.pending_changes(), 1);

        assert!(facade.consume().await.expect("consume"));
        assert_eq!(facade.current_snapshot().version(), 1);
        assert_eq!(facade.current_snapshot().len(), 2);
    }

    #[tokio::test]
    async fn create_snapshot_reuses_current_unless_forced() {
        let facade = facade(FakeSource::with(site()));
        let first = facade.create_snapshot(false).await.expect("build");
        let again = facade.create_snapshot(false).await.expect("reuse");
        assert!(Arc::ptr_eq(&first, &again));

        let forced = facade.create_snapshot(true).await.expect("rebuild");
        assert_eq!(forced.version(), 2);
    }

    #[tokio::test]
    async fn small_change_sets_patch_the_current_snapshot() {
        let source = FakeSource::with(site());
        let facade = facade(Arc::clone(&source));
        let before = facade.create_snapshot(true).await.expect("build");

        let mut records = site();
        records.push(ContentRecord::new(3, Some(2), "Post", "page"));
        source.set(records);
        assert!(facade.notify(ChangeSet::created(ContentId(3))));
        assert!(facade.consume().await.expect("consume"));

        let after = facade.current_snapshot();
        assert_eq!(after.version(), 2);
        assert_eq!(
            after
                .content_at_route(&RouteKey::new(ContentId(1), "/blog/post"))
                .map(|n| n.id),
            Some(ContentId(3))
        );
        assert_eq!(*source.subtree_fetches.lock().expect("fetches"), [ContentId(3)]);
        assert!(Arc::ptr_eq(
            before.get(ContentId(1)).expect("home before"),
            after.get(ContentId(1)).expect("home after")
        ));
        assert!(before.get(ContentId(3)).is_none());
    }

    #[tokio::test]
    async fn rejected_patch_falls_back_to_full_rebuild() {
        let source = FakeSource::with(site());
        let facade = facade(Arc::clone(&source));
        facade.create_snapshot(true).await.expect("build");

        // 11 arrives before its new parent 10 is in any snapshot.
        let mut records = site();
        records.push(ContentRecord::new(10, Some(1), "Shop", "page"));
        records.push(ContentRecord::new(11, Some(10), "Cart", "page"));
        source.set(records);
        assert!(facade.notify(ChangeSet::created(ContentId(11))));
        assert!(facade.consume().await.expect("consume"));

        let snapshot = facade.current_snapshot();
        assert_eq!(
            snapshot.route_of(ContentId(11)),
            Some(&RouteKey::new(ContentId(1), "/shop/cart"))
        );
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_snapshot_and_pending_changes() {
        let source = FakeSource::with(site());
        let facade = facade(Arc::clone(&source));
        facade.create_snapshot(true).await.expect("build");

        source.failing.store(true, Ordering::SeqCst);
        assert!(facade.notify(ChangeSet::updated(ContentId(2))));
        assert!(facade.consume().await.is_err());
        assert_eq!(facade.current_snapshot().version(), 1);
        assert_eq!(facade.pending_changes(), 1);

        source.failing.store(false, Ordering::SeqCst);
        assert!(facade.consume().await.expect("retry"));
        assert_eq!(facade.current_snapshot().version(), 2);
        assert_eq!(facade.pending_changes(), 0);
    }

    #[tokio::test]
    async fn worker_applies_notifications_until_shutdown() {
        let source = FakeSource::with(site());
        let facade = Arc::new(facade(Arc::clone(&source)));
        let shutdown = CancellationToken::new();
        let worker = facade.spawn_worker(shutdown.clone());

        assert!(facade.notify(ChangeSet::full()));
        for _ in 0..200 {
            if facade.current_snapshot().version() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(facade.current_snapshot().version(), 1);

        shutdown.cancel();
        worker.await.expect("worker join");
    }
}
