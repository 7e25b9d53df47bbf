use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Lock a std mutex, recovering the guard if a previous holder panicked.
///
/// Facade bookkeeping (pending changes, version history) stays usable after a
/// panic; the worst case is a stale entry that the next rebuild replaces.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock()
        .unwrap_or_else(|poisoned| recover(poisoned, target, op))
}

fn recover<G>(poisoned: PoisonError<G>, target: &'static str, op: &'static str) -> G {
    warn!(
        op,
        target_module = target,
        lock_kind = "mutex.lock",
        result = "poisoned_recovered",
        hint = "pending changes or history may be stale after a panic in another thread",
        "Recovered from poisoned facade lock"
    );
    poisoned.into_inner()
}
