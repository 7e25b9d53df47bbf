//! Rebuild planning.
//!
//! Turns a pending batch into either a full rebuild or an incremental patch
//! of the current snapshot.

use std::fmt;

use crate::domain::content::ContentId;

use super::events::{ChangeKind, PendingBatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildPlan {
    Full,
    Incremental {
        /// Subtrees to refetch, in the order their changes arrived.
        replace: Vec<ContentId>,
        remove: Vec<ContentId>,
    },
}

impl fmt::Display for RebuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildPlan::Full => f.write_str("RebuildPlan::Full"),
            RebuildPlan::Incremental { replace, remove } => write!(
                f,
                "RebuildPlan::Incremental {{ replace: {}, remove: {} }}",
                replace.len(),
                remove.len()
            ),
        }
    }
}

impl RebuildPlan {
    /// Plan one cycle.
    ///
    /// Full rebuild when the batch asks for it, when there is no built
    /// snapshot to patch, or when more than `incremental_max_changes` ids
    /// changed.
    pub fn from_batch(batch: &PendingBatch, incremental_max_changes: usize, has_base: bool) -> Self {
        if batch.full_invalidate || !has_base || batch.changes.len() > incremental_max_changes {
            return RebuildPlan::Full;
        }

        let mut ordered: Vec<_> = batch.changes.iter().collect();
        ordered.sort_by_key(|(id, (epoch, _))| (*epoch, **id));

        let mut replace = Vec::new();
        let mut remove = Vec::new();
        for (id, (_, kind)) in ordered {
            match kind {
                ChangeKind::Removed => remove.push(*id),
                ChangeKind::Created | ChangeKind::Updated => replace.push(*id),
            }
        }

        RebuildPlan::Incremental { replace, remove }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            RebuildPlan::Full => "full",
            RebuildPlan::Incremental { .. } => "incremental",
        }
    }
}
