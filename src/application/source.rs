//! Content source trait describing the external source of truth.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::{ContentId, ContentRecord};
use crate::domain::content_types::ContentTypeDescriptor;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("content source unavailable: {0}")]
    Unavailable(String),
    #[error("content source returned malformed data: {message}")]
    Malformed { message: String },
}

impl SourceError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Read access to published content.
///
/// Every call must observe a single point-in-time view of the store.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_content_types(&self) -> Result<Vec<ContentTypeDescriptor>, SourceError>;

    /// Every published record reachable from a top-level record through
    /// published parents.
    async fn fetch_published_tree(&self) -> Result<Vec<ContentRecord>, SourceError>;

    /// Records for `root_id` and all of its published descendants.
    ///
    /// An empty result means `root_id` is no longer published.
    async fn fetch_subtree(&self, root_id: ContentId) -> Result<Vec<ContentRecord>, SourceError>;
}

/// Select `root_id` and its published descendants out of a full record set.
pub fn select_subtree(records: &[ContentRecord], root_id: ContentId) -> Vec<ContentRecord> {
    let published: Vec<&ContentRecord> = records.iter().filter(|r| r.published).collect();
    let Some(root) = published.iter().find(|r| r.id == root_id) else {
        return Vec::new();
    };

    let mut selected = vec![(*root).clone()];
    let mut frontier = vec![root_id];
    while let Some(parent) = frontier.pop() {
        for record in published.iter().filter(|r| r.parent_id == Some(parent)) {
            // Guard against malformed self-parenting records.
            if record.id == parent || selected.iter().any(|s| s.id == record.id) {
                continue;
            }
            selected.push((*record).clone());
            frontier.push(record.id);
        }
    }

    selected
}

/// Published top-level records and their published descendants.
pub fn select_published_tree(records: &[ContentRecord]) -> Vec<ContentRecord> {
    records
        .iter()
        .filter(|r| r.published && r.parent_id.is_none())
        .flat_map(|root| select_subtree(records, root.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_subtree_follows_published_descendants() {
        let records = vec![
            ContentRecord::new(1, None, "Home", "home"),
            ContentRecord::new(2, Some(1), "Blog", "page"),
            ContentRecord::new(3, Some(2), "Post", "page"),
            ContentRecord::new(4, Some(2), "Draft", "page").unpublished(),
            ContentRecord::new(5, Some(4), "Under draft", "page"),
            ContentRecord::new(6, Some(1), "About", "page"),
        ];

        let mut ids: Vec<i32> = select_subtree(&records, ContentId(2))
            .into_iter()
            .map(|r| r.id.0)
            .collect();
        ids.sort();
        assert_eq!(ids, [2, 3]);
    }

    #[test]
    fn published_tree_skips_branches_under_drafts() {
        let records = vec![
            ContentRecord::new(1, None, "Home", "home"),
            ContentRecord::new(4, Some(1), "Draft", "page").unpublished(),
            ContentRecord::new(5, Some(4), "Under draft", "page"),
            ContentRecord::new(6, Some(1), "About", "page"),
            ContentRecord::new(7, None, "Hidden site", "home").unpublished(),
            ContentRecord::new(8, Some(7), "Hidden page", "page"),
        ];

        let ids: Vec<i32> = select_published_tree(&records)
            .into_iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, [1, 6]);
    }

    #[test]
    fn select_subtree_of_unpublished_root_is_empty() {
        let records = vec![ContentRecord::new(1, None, "Home", "home").unpublished()];
        assert!(select_subtree(&records, ContentId(1)).is_empty());
    }
}
