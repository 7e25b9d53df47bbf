//! Published-content facade.
//!
//! Keeps an immutable, versioned snapshot of the whole published content tree
//! in memory:
//!
//! - **Snapshot**: tree of `Arc` nodes plus id, key, route and alias indices
//! - **Store**: atomically swapped current pointer with a weak version history
//! - **Service**: coalesces change notifications and rebuilds or patches
//!
//! ## Configuration
//!
//! ```toml
//! [facade]
//! incremental_max_changes = 16
//! refresh_interval_ms = 0
//! retained_versions = 8
//! dedupe_window = 256
//! ```

mod config;
mod events;
mod lock;
mod planner;
mod service;
mod snapshot;
mod store;
mod trigger;

pub use config::FacadeConfig;
pub use events::{ChangeKind, ChangeQueue, ChangeSet, ContentChange, Epoch, PendingBatch};
pub use planner::RebuildPlan;
pub use service::{
    FacadeError, FacadeService, METRIC_PENDING_CHANGES, METRIC_REBUILD_FAILED_TOTAL,
    METRIC_REBUILD_MS, METRIC_REBUILD_TOTAL, METRIC_VERSION,
};
pub use snapshot::{RouteKey, Snapshot, SnapshotBuildError, SubtreeChange};
pub use store::SnapshotStore;
pub use trigger::FacadeTrigger;
