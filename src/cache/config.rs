//! Facade configuration.
//!
//! Controls rebuild planning, periodic refresh and the bounded history kept
//! by the snapshot store. Loaded from the `[facade]` section of `folio.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_INCREMENTAL_MAX_CHANGES: usize = 16;
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 0;
const DEFAULT_RETAINED_VERSIONS: usize = 8;
const DEFAULT_DEDUPE_WINDOW: usize = 256;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// Largest number of changed ids patched incrementally.
    pub incremental_max_changes: usize,
    /// Periodic full refresh interval (ms); 0 disables it.
    pub refresh_interval_ms: u64,
    /// Recent snapshot versions reachable through the store history.
    pub retained_versions: usize,
    /// Change-set ids remembered for redelivery detection.
    pub dedupe_window: usize,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            incremental_max_changes: DEFAULT_INCREMENTAL_MAX_CHANGES,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            retained_versions: DEFAULT_RETAINED_VERSIONS,
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
        }
    }
}

impl From<&crate::config::FacadeSettings> for FacadeConfig {
    fn from(settings: &crate::config::FacadeSettings) -> Self {
        Self {
            incremental_max_changes: settings.incremental_max_changes,
            refresh_interval_ms: settings.refresh_interval_ms,
            retained_versions: settings.retained_versions,
            dedupe_window: settings.dedupe_window,
        }
    }
}

impl FacadeConfig {
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_ms > 0).then(|| Duration::from_millis(self.refresh_interval_ms))
    }

    /// Returns the retained versions as NonZeroUsize, clamping to 1 if zero.
    pub fn retained_versions_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.retained_versions).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the dedupe window as NonZeroUsize, clamping to 1 if zero.
    pub fn dedupe_window_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.dedupe_window).unwrap_or(NonZeroUsize::MIN)
    }
}
