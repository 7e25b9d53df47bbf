//! Facade trigger.
//!
//! Convenience API for turning content-store notifications into change sets
//! and optionally running the rebuild inline.

use std::sync::Arc;

use tracing::debug;

use crate::domain::content::ContentId;

use super::events::ChangeSet;
use super::service::FacadeService;

/// # Usage
///
/// ```ignore
/// // After the content store publishes a node:
/// trigger.content_updated(node_id, false);
/// ```
#[derive(Clone)]
pub struct FacadeTrigger {
    facade: Arc<FacadeService>,
}

impl FacadeTrigger {
    pub fn new(facade: Arc<FacadeService>) -> Self {
        Self { facade }
    }

    /// Enqueue a change set; with `consume_now` the caller waits for one
    /// rebuild cycle instead of leaving it to the worker.
    ///
    /// Returns whether the change set was accepted.
    pub async fn trigger(&self, change_set: ChangeSet, consume_now: bool) -> bool {
        let id = change_set.id;
        if !self.facade.notify(change_set) {
            debug!(change_set_id = %id, "Facade trigger skipped: nothing to apply");
            return false;
        }

        // Failures are logged by the facade and retried on the next cycle.
        if consume_now && self.facade.consume().await.is_err() {
            debug!(change_set_id = %id, "Inline rebuild failed; left pending");
        }
        true
    }

    pub async fn content_created(&self, id: ContentId, consume_now: bool) -> bool {
        self.trigger(ChangeSet::created(id), consume_now).await
    }

    pub async fn content_updated(&self, id: ContentId, consume_now: bool) -> bool {
        self.trigger(ChangeSet::updated(id), consume_now).await
    }

    pub async fn content_removed(&self, id: ContentId, consume_now: bool) -> bool {
        self.trigger(ChangeSet::removed(id), consume_now).await
    }

    pub async fn refresh_all(&self, consume_now: bool) -> bool {
        self.trigger(ChangeSet::full(), consume_now).await
    }
}
