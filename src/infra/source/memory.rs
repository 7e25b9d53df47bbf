use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, OwnedRwLockWriteGuard, RwLock};

use crate::application::source::{
    ContentSource, SourceError, select_published_tree, select_subtree,
};
use crate::domain::content::{ContentId, ContentRecord};
use crate::domain::content_types::ContentTypeDescriptor;

#[derive(Debug, Default)]
struct MemoryState {
    content_types: Vec<ContentTypeDescriptor>,
    records: Vec<ContentRecord>,
}

/// In-process content source.
///
/// Fetches can be paused with [`MemoryContentSource::hold`], which lets
/// callers observe what happens to notifications that arrive mid-rebuild.
#[derive(Debug, Default)]
pub struct MemoryContentSource {
    state: RwLock<MemoryState>,
    gate: Arc<RwLock<()>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
    fetch_started: Notify,
}

/// Pauses every fetch on the source until dropped.
#[derive(Debug)]
pub struct SourceHold {
    _guard: OwnedRwLockWriteGuard<()>,
}

impl MemoryContentSource {
    pub fn new(content_types: Vec<ContentTypeDescriptor>, records: Vec<ContentRecord>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                content_types,
                records,
            }),
            ..Default::default()
        }
    }

    pub async fn replace_all(&self, records: Vec<ContentRecord>) {
        self.state.write().await.records = records;
    }

    /// Insert or replace the record with the same id.
    pub async fn upsert(&self, record: ContentRecord) {
        let mut state = self.state.write().await;
        match state.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => state.records.push(record),
        }
    }

    /// Remove a record and everything below it.
    pub async fn remove(&self, id: ContentId) {
        let mut state = self.state.write().await;
        let mut doomed = vec![id];
        let mut cursor = 0;
        while let Some(parent) = doomed.get(cursor).copied() {
            doomed.extend(
                state
                    .records
                    .iter()
                    .filter(|r| r.parent_id == Some(parent) && !doomed.contains(&r.id))
                    .map(|r| r.id)
                    .collect::<Vec<_>>(),
            );
            cursor += 1;
        }
        state.records.retain(|r| !doomed.contains(&r.id));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Block fetches until the returned hold is dropped.
    pub async fn hold(&self) -> SourceHold {
        SourceHold {
            _guard: Arc::clone(&self.gate).write_owned().await,
        }
    }

    /// Wait until a fetch has started since the previous call.
    pub async fn fetch_started(&self) {
        self.fetch_started.notified().await;
    }

    /// Total fetch calls made so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_started.notify_one();
        let _open = self.gate.read().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("memory source set to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn fetch_content_types(&self) -> Result<Vec<ContentTypeDescriptor>, SourceError> {
        self.enter().await?;
        Ok(self.state.read().await.content_types.clone())
    }

    async fn fetch_published_tree(&self) -> Result<Vec<ContentRecord>, SourceError> {
        self.enter().await?;
        Ok(select_published_tree(&self.state.read().await.records))
    }

    async fn fetch_subtree(&self, root_id: ContentId) -> Result<Vec<ContentRecord>, SourceError> {
        self.enter().await?;
        Ok(select_subtree(&self.state.read().await.records, root_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn source() -> MemoryContentSource {
        MemoryContentSource::new(
            vec![ContentTypeDescriptor::root("page")],
            vec![
                ContentRecord::new(1, None, "Home", "page"),
                ContentRecord::new(2, Some(1), "Blog", "page"),
                ContentRecord::new(3, Some(2), "Post", "page"),
            ],
        )
    }

    #[tokio::test]
    async fn remove_drops_descendants() {
        let source = source();
        source.remove(ContentId(2)).await;
        let ids: Vec<i32> = source
            .fetch_published_tree()
            .await
            .expect("tree")
            .into_iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, [1]);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let source = source();
        source
            .upsert(ContentRecord::new(2, Some(1), "Journal", "page"))
            .await;
        let tree = source.fetch_published_tree().await.expect("tree");
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[1].name, "Journal");
    }

    #[tokio::test]
    async fn failing_source_reports_unavailable() {
        let source = source();
        source.set_failing(true);
        assert!(matches!(
            source.fetch_content_types().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn hold_blocks_fetches_until_released() {
        let source = Arc::new(source());
        let hold = source.hold().await;

        let fetch = tokio::spawn({
            let source = Arc::clone(&source);
            async move { source.fetch_published_tree().await }
        });
        source.fetch_started().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!fetch.is_finished());

        drop(hold);
        let tree = fetch.await.expect("join").expect("tree");
        assert_eq!(tree.len(), 3);
        assert_eq!(source.fetch_count(), 1);
    }
}
